use std::env;

const DEFAULT_CONNECTION_STRING: &str = "sqlite:./stats.db";
const DEFAULT_DATABASE: &str = "stats";
const DEFAULT_ROUTE_PREFIX: &str = "/api";

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub connection_string: String,
    pub database_name: String,
    pub route_prefix: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // The functions host hands the custom handler its port
        let port = lookup("FUNCTIONS_CUSTOMHANDLER_PORT")
            .or_else(|| lookup("PORT"))
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid port value: {}", e))?;

        let connection_string = lookup("MongoConnectionString")
            .or_else(|| lookup("DATABASE_URL"))
            .unwrap_or_else(|| DEFAULT_CONNECTION_STRING.to_string());

        let database_name =
            lookup("MONGO_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let route_prefix = normalize_prefix(
            &lookup("ROUTE_PREFIX").unwrap_or_else(|| DEFAULT_ROUTE_PREFIX.to_string()),
        );

        Ok(Config {
            port,
            connection_string,
            database_name,
            route_prefix,
        })
    }
}

/// Leading slash, no trailing slash. An empty result mounts routes at the root.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.connection_string, "sqlite:./stats.db");
        assert_eq!(config.database_name, "stats");
        assert_eq!(config.route_prefix, "/api");
    }

    #[test]
    fn mongo_connection_string_wins_over_database_url() {
        let config = config_from(&[
            ("MongoConnectionString", "mongodb://db.internal:27017/recycling"),
            ("DATABASE_URL", "sqlite::memory:"),
        ])
        .unwrap();
        assert_eq!(
            config.connection_string,
            "mongodb://db.internal:27017/recycling"
        );
    }

    #[test]
    fn custom_handler_port_wins_over_port() {
        let config = config_from(&[("FUNCTIONS_CUSTOMHANDLER_PORT", "7071"), ("PORT", "9000")])
            .unwrap();
        assert_eq!(config.port, 7071);

        let config = config_from(&[("PORT", "9000")]).unwrap();
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("Invalid port value"));
    }

    #[test]
    fn route_prefix_is_normalized() {
        assert_eq!(normalize_prefix("api/"), "/api");
        assert_eq!(normalize_prefix("/v1/functions/"), "/v1/functions");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
    }
}
