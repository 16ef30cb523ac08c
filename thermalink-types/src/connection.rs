//! Connection identity and public views

use std::fmt;

use uuid::Uuid;

/// Identifier of one logical printer connection
///
/// Generated when a connect attempt starts and never reused, even when the
/// same address is connected again later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for ConnectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A device reported by a discovery scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BluetoothDevice {
    /// Advertised name, if any
    pub name: Option<String>,

    /// Transport address (MAC, BLE UUID or `host:port`)
    pub address: String,
}

impl BluetoothDevice {
    pub fn new(name: Option<String>, address: impl Into<String>) -> Self {
        Self {
            name,
            address: address.into(),
        }
    }
}

/// Public view of a connection, handed to callers and event observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterConnection {
    pub connection_id: ConnectionId,
    pub address: String,

    /// Name reported by the transport once the connection is confirmed
    pub name: Option<String>,
}

impl fmt::Display for PrinterConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Printer[{} @ {}, id: {}]",
            self.name.as_deref().unwrap_or("unnamed"),
            self.address,
            self.connection_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();

        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_connection_display() {
        let connection = PrinterConnection {
            connection_id: ConnectionId::from("abc"),
            address: "AA:BB".into(),
            name: None,
        };

        assert_eq!(connection.to_string(), "Printer[unnamed @ AA:BB, id: abc]");
    }
}
