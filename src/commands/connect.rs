use tracing::debug;

use crate::ConnectionError;
use crate::adapter::PartnerCenterApiAdapter;
use crate::connection::ConnectionData;
use crate::factory::ConnectionFactory;
use crate::http_client::HttpClient;

pub struct ConnectCommand<C>
where
    C: HttpClient,
{
    factory: ConnectionFactory<C, PartnerCenterApiAdapter>,
}

impl<C> ConnectCommand<C>
where
    C: HttpClient,
{
    pub fn new(factory: ConnectionFactory<C, PartnerCenterApiAdapter>) -> Self {
        Self { factory }
    }

    /// Opens an app-only connection and returns its persistable form.
    pub fn connect(self) -> Result<ConnectionData, ConnectionError> {
        let connection = self.factory.create_admin_connection()?;
        debug!(
            provider_id = connection.provider_id(),
            expires_at = ?connection.expires_at(),
            "connection established"
        );
        Ok(connection.create_data())
    }
}
