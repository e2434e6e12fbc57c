use std::env;

#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: String,
    pub server: String,
    pub port: u32,
    pub database: String,
}

impl AppConfig {
    /// DATABASE_URL wins when set; otherwise the URL is assembled from the
    /// discrete MAINTSERVER_DB_* variables.
    pub fn database_url(&self) -> String {
        if let Ok(url) = env::var("DATABASE_URL") {
            return url;
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.database.username,
            self.database.password,
            self.database.server,
            self.database.port,
            self.database.database
        )
    }

    pub fn from_env() -> Self {
        let server = ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8090),
        };

        let database = DatabaseConfig {
            username: env::var("MAINTSERVER_DB_USER").unwrap_or_else(|_| "maintuser".to_string()),
            password: env::var("MAINTSERVER_DB_PASSWORD").unwrap_or_default(),
            server: env::var("MAINTSERVER_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("MAINTSERVER_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5432),
            database: env::var("MAINTSERVER_DB_NAME").unwrap_or_else(|_| "maintserver".to_string()),
        };

        Self { server, database }
    }
}
