use crate::error::ReminderError;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Prefix of the per-week storage key.
    pub app_prefix: String,
    /// Key wrapping every cross-frame message.
    pub message_namespace: String,
    pub log_level: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            app_prefix: "noclock".to_string(),
            message_namespace: "timesheetReminder".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ReminderConfig {
    /// Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ReminderError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReminderError> {
        if self.app_prefix.is_empty() {
            return Err(ReminderError::Config("app_prefix is empty".to_string()));
        }
        if self.message_namespace.is_empty() {
            return Err(ReminderError::Config("message_namespace is empty".to_string()));
        }
        self.log_level
            .parse::<tracing::Level>()
            .map_err(|_| ReminderError::Config(format!("unknown log level `{}`", self.log_level)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = ReminderConfig::from_json(r#"{"app_prefix": "away"}"#).unwrap();
        assert_eq!(config.app_prefix, "away");
        assert_eq!(config.message_namespace, "timesheetReminder");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ReminderConfig::from_json(r#"{"log_level": "loud"}"#),
            Err(ReminderError::Config(_))
        ));
        assert!(matches!(
            ReminderConfig::from_json("not json"),
            Err(ReminderError::Json(_))
        ));
    }
}
