use domain::Credentials;
use serde::Deserialize;
use utoipa::ToSchema;

/// Login form. Empty host and port fall back to the configured defaults.
#[derive(Deserialize, ToSchema)]
#[schema(example = json!({"host": "localhost", "port": 6379, "username": "default", "password": ""}))]
pub(crate) struct LoginParams {
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
}

impl From<LoginParams> for Credentials {
    fn from(params: LoginParams) -> Self {
        Credentials {
            host: params.host.filter(|host| !host.is_empty()),
            port: params.port,
            username: params.username.filter(|username| !username.is_empty()),
            password: params.password.filter(|password| !password.is_empty()),
        }
    }
}
