use crate::endpoint::Endpoint;
use crate::Result;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers::{ContainerAsync, GenericImage};
use typed_builder::TypedBuilder;

const MYSQL_PORT: u16 = 3306;

/// Database and credentials the rotator store connects with.
#[derive(Debug, Clone, TypedBuilder)]
pub struct MysqlConfig {
    #[builder(default = "8.4".to_string(), setter(into))]
    image_tag: String,
    #[builder(default = "rotator".to_string(), setter(into))]
    database: String,
    #[builder(default = "rotator".to_string(), setter(into))]
    username: String,
    #[builder(default = "rotator".to_string(), setter(into))]
    password: String,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Disposable MySQL holding an empty rotator database.
///
/// The schema is not applied; the store does that itself on startup.
pub struct MySqlServer {
    _container: ContainerAsync<GenericImage>,
    endpoint: Endpoint,
    config: MysqlConfig,
}

impl MySqlServer {
    pub async fn new(config: MysqlConfig) -> Result<Self> {
        let container = GenericImage::new("mysql", config.image_tag.as_str())
            .with_exposed_port(MYSQL_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr("ready for connections"))
            .with_env_var("MYSQL_DATABASE", config.database.as_str())
            .with_env_var("MYSQL_USER", config.username.as_str())
            .with_env_var("MYSQL_PASSWORD", config.password.as_str())
            .with_env_var("MYSQL_ROOT_PASSWORD", "root")
            .start()
            .await?;
        let endpoint = Endpoint::of(&container, MYSQL_PORT).await?;

        Ok(Self {
            _container: container,
            endpoint,
            config,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// DSN in the form `MySqlRepository::connect` accepts.
    pub fn database_url(&self) -> String {
        format!(
            "mysql://{}:{}@{}/{}",
            self.config.username, self.config.password, self.endpoint, self.config.database
        )
    }
}
