use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Role {
    Patient => "patient",
    Doctor => "doctor",
});

str_enum!(AuthProvider {
    Email => "email",
    Google => "google",
});

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_parses_stored_values() {
        assert_eq!(Role::from_str("patient").unwrap(), Role::Patient);
        assert_eq!(Role::from_str("doctor").unwrap(), Role::Doctor);
        assert_eq!(Role::Doctor.as_str(), "doctor");
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = Role::from_str("admin").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
        assert!(err.to_string().contains("admin"));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Role::Doctor).unwrap(), "doctor");
        let parsed: Role = serde_json::from_str("\"patient\"").unwrap();
        assert_eq!(parsed, Role::Patient);
    }

    #[test]
    fn appointment_status_display() {
        assert_eq!(AppointmentStatus::Scheduled.to_string(), "scheduled");
        assert_eq!(
            AppointmentStatus::from_str("cancelled").unwrap(),
            AppointmentStatus::Cancelled
        );
    }
}
