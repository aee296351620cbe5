use super::schema::Config;

macro_rules! define_overrides {
    ($( $name:literal, $env:literal => $($path:ident).+ );* $(;)?) => {
        /// (slot name, env var name) pairs.
        pub const ENV_OVERRIDES: &[(&str, &str)] = &[$(($name, $env)),*];

        /// Apply environment variable overrides.
        ///
        /// Any `HRMAIL_*` env var that is set and non-empty will overwrite the
        /// corresponding config field, so secrets can be injected without
        /// touching the config file.
        pub fn apply_env_overrides(config: &mut Config) {
            $(
                if let Ok(val) = std::env::var($env) {
                    if !val.is_empty() {
                        config.$($path).+ = val;
                    }
                }
            )*
        }

        /// Whether a slot currently holds a non-empty value.
        pub fn is_set(config: &Config, name: &str) -> bool {
            match name {
                $($name => !config.$($path).+.is_empty(),)*
                _ => false,
            }
        }
    };
}

define_overrides! {
    "session-secret", "HRMAIL_SESSION_SECRET" => session.secret;
    "database-path",  "HRMAIL_DATABASE_PATH"  => mailbox.database_path;
}
