use serde::Deserialize;
use tracing::debug;

use crate::api::{ApiError, PartnerCenter};
use crate::http_client::HttpClient;

const ORGANIZATION_PROFILE_PATH: &str = "v1/profiles/organization";

/// Presentation values of a connection, filled by an [`ApiAdapter`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionValues {
    pub display_name: Option<String>,
    pub profile_url: Option<String>,
    pub image_url: Option<String>,
}

/// Normalized view of the account behind a connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub id: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

/// Maps the provider specific API onto the uniform connection model.
pub trait ApiAdapter<C: HttpClient> {
    /// Whether the API is currently usable with the bound credentials.
    fn test(&self, api: &PartnerCenter<C>) -> bool;

    fn set_connection_values(
        &self,
        api: &PartnerCenter<C>,
        values: &mut ConnectionValues,
    ) -> Result<(), ApiError>;

    fn fetch_user_profile(&self, api: &PartnerCenter<C>) -> Result<UserProfile, ApiError>;

    /// Publishes a status message on behalf of the account. Providers without such a notion
    /// accept and ignore it.
    fn update_status(&self, api: &PartnerCenter<C>, message: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganizationProfile {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    default_address: Option<Address>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Address {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

/// Adapter backed by the partner organization profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartnerCenterApiAdapter;

impl PartnerCenterApiAdapter {
    fn organization_profile<C: HttpClient>(
        api: &PartnerCenter<C>,
    ) -> Result<OrganizationProfile, ApiError> {
        api.get(ORGANIZATION_PROFILE_PATH)
    }
}

impl<C: HttpClient> ApiAdapter<C> for PartnerCenterApiAdapter {
    fn test(&self, api: &PartnerCenter<C>) -> bool {
        match Self::organization_profile(api) {
            Ok(_) => true,
            Err(e) => {
                debug!("partner center api test failed: {e}");
                false
            }
        }
    }

    fn set_connection_values(
        &self,
        api: &PartnerCenter<C>,
        values: &mut ConnectionValues,
    ) -> Result<(), ApiError> {
        let profile = Self::organization_profile(api)?;
        values.display_name = profile.company_name;
        Ok(())
    }

    fn fetch_user_profile(&self, api: &PartnerCenter<C>) -> Result<UserProfile, ApiError> {
        let profile = Self::organization_profile(api)?;
        let (first_name, last_name) = profile
            .default_address
            .map(|address| (address.first_name, address.last_name))
            .unwrap_or_default();

        Ok(UserProfile {
            id: profile.id,
            name: profile.company_name,
            first_name,
            last_name,
            email: profile.email,
        })
    }

    // Partner Center has no notion of a status update.
    fn update_status(&self, _api: &PartnerCenter<C>, _message: &str) -> Result<(), ApiError> {
        debug!("status updates are not supported by partner center, ignoring");
        Ok(())
    }
}
