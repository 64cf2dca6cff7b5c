//! Connection configuration and connection string parsing
//!
//! Supports the Firebird connection string forms:
//! - `host[/port]:path`
//! - `//host[:port]/path`
//! - `path` (local server)

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::clumplet::{BlockKind, Clumplet, ParameterBlock};
use crate::constants::{dialect, dpb};
use crate::error::{Error, Result};

/// Default Firebird port
pub const DEFAULT_PORT: u16 = 3050;

/// Connection character sets whose text travels as UTF-8 bytes
const UTF8_CHARSETS: &[&str] = &["UTF8", "UNICODE_FSS", "NONE", "ASCII"];

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection configuration for a Firebird database.
///
/// # Examples
///
/// ```rust
/// use firebird_wire::Config;
///
/// let config = Config::new("localhost", "/data/employee.fdb", "SYSDBA", "masterkey")
///     .port(3051)
///     .charset("UTF8");
/// ```
///
/// ```rust
/// use firebird_wire::Config;
///
/// let config: Config = "dbhost/3051:/data/employee.fdb".parse().unwrap();
/// assert_eq!(config.port, 3051);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to connect to
    pub host: String,
    /// Port to connect to
    pub port: u16,
    /// Database path or alias on the server
    pub database: String,
    /// User name
    pub username: String,
    /// Password (stored temporarily)
    password: String,
    /// SQL role
    pub role: Option<String>,
    /// Connection character set (`lc_ctype`)
    pub charset: Option<String>,
    /// SQL dialect
    pub dialect: i32,
    /// Operating system user reported in the connect request
    pub client_user: String,
    /// Client host name reported in the connect request
    pub client_host: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Additional database parameter block entries
    pub extra_parameters: ParameterBlock,
}

impl Config {
    /// Create a new configuration
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the SQL role
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the connection character set.
    ///
    /// Strings are always sent as UTF-8, so only `UTF8`, `UNICODE_FSS`,
    /// `NONE` and `ASCII` are accepted when attaching.
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Set the SQL dialect
    pub fn dialect(mut self, dialect: i32) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the client identification sent with the connect request
    pub fn client(mut self, user: impl Into<String>, host: impl Into<String>) -> Self {
        self.client_user = user.into();
        self.client_host = host.into();
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Add a database parameter block entry
    pub fn parameter(mut self, clumplet: Clumplet) -> Self {
        self.extra_parameters.push(clumplet);
        self
    }

    /// Get the password (for the database parameter block)
    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// Set the password
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    /// Set the username
    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    /// Build the database parameter block sent with attach and create
    pub fn database_parameters(&self) -> ParameterBlock {
        let mut block = ParameterBlock::new(BlockKind::Tagged);
        if !self.username.is_empty() {
            block.push(Clumplet::string(dpb::USER_NAME, &self.username));
        }
        if !self.password().is_empty() {
            block.push(Clumplet::string(dpb::PASSWORD, self.password()));
        }
        if let Some(role) = &self.role {
            block.push(Clumplet::string(dpb::SQL_ROLE_NAME, role));
        }
        if let Some(charset) = &self.charset {
            block.push(Clumplet::string(dpb::LC_CTYPE, charset));
        }
        block.push(Clumplet::int(dpb::SQL_DIALECT, self.dialect));
        for clumplet in &self.extra_parameters {
            block.push(clumplet.clone());
        }
        block
    }

    /// Reject a connection character set that strings are not encoded in
    pub fn check_charset(&self) -> Result<()> {
        match &self.charset {
            Some(charset) if !UTF8_CHARSETS.iter().any(|c| c.eq_ignore_ascii_case(charset)) => {
                Err(Error::UnsupportedCharset(charset.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            database: String::new(),
            username: String::new(),
            password: String::new(),
            role: None,
            charset: None,
            dialect: dialect::V6,
            client_user: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_default(),
            client_host: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            extra_parameters: ParameterBlock::new(BlockKind::Tagged),
        }
    }
}

fn parse_port(port: &str) -> Result<u16> {
    port.parse()
        .map_err(|_| Error::InvalidConnectionString(format!("invalid port number '{}'", port)))
}

fn split_host_port(host_port: &str, separator: char) -> Result<(String, u16)> {
    let (host, port) = match host_port.split_once(separator) {
        Some((host, port)) => (host, parse_port(port)?),
        None => (host_port, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(Error::InvalidConnectionString("missing host".to_string()));
    }
    Ok((host.to_string(), port))
}

/// `C:\...` or `C:/...` is a local Windows path, not `host:path`
fn is_drive_path(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && matches!(bytes[2], b'\\' | b'/')
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidConnectionString(
                "empty connection string".to_string(),
            ));
        }

        let mut config = Config::default();

        if let Some(rest) = s.strip_prefix("//") {
            let (host_port, path) = rest
                .split_once('/')
                .ok_or_else(|| Error::InvalidConnectionString("missing database path".to_string()))?;
            if path.is_empty() {
                return Err(Error::InvalidConnectionString("missing database path".to_string()));
            }
            let (host, port) = split_host_port(host_port, ':')?;
            config.host = host;
            config.port = port;
            config.database = path.to_string();
        } else if let Some((host_port, path)) = s.split_once(':').filter(|_| !is_drive_path(s)) {
            if host_port.is_empty() || path.is_empty() {
                return Err(Error::InvalidConnectionString(format!(
                    "separator at the start or end of '{}'",
                    s
                )));
            }
            let (host, port) = split_host_port(host_port, '/')?;
            config.host = host;
            config.port = port;
            config.database = path.to_string();
        } else {
            config.database = s.to_string();
        }

        Ok(config)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.port == DEFAULT_PORT {
            write!(f, "{}:{}", self.host, self.database)
        } else {
            write!(f, "{}/{}:{}", self.host, self.port, self.database)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_must_be_utf8_compatible() {
        let config = Config::new("localhost", "employee", "SYSDBA", "masterkey");
        assert!(config.check_charset().is_ok());
        assert!(config.clone().charset("utf8").check_charset().is_ok());
        assert!(config.clone().charset("NONE").check_charset().is_ok());

        let err = config.charset("WIN1252").check_charset().unwrap_err();
        assert!(matches!(&err, Error::UnsupportedCharset(name) if name == "WIN1252"));
        assert_eq!(err.gds_code(), Some(335544326));
    }

    #[test]
    fn test_parse_legacy_full() {
        let config: Config = "myhost/3051:/data/test.fdb".parse().unwrap();
        assert_eq!(config.host, "myhost");
        assert_eq!(config.port, 3051);
        assert_eq!(config.database, "/data/test.fdb");
    }

    #[test]
    fn test_parse_legacy_default_port() {
        let config: Config = "myhost:employee".parse().unwrap();
        assert_eq!(config.host, "myhost");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database, "employee");
    }

    #[test]
    fn test_parse_url_form() {
        let config: Config = "//myhost:3052/data/test.fdb".parse().unwrap();
        assert_eq!(config.host, "myhost");
        assert_eq!(config.port, 3052);
        assert_eq!(config.database, "data/test.fdb");

        let config: Config = "//myhost/employee".parse().unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database, "employee");
    }

    #[test]
    fn test_parse_bare_path() {
        let config: Config = "/data/test.fdb".parse().unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.database, "/data/test.fdb");

        let config: Config = "C:\\data\\test.fdb".parse().unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.database, "C:\\data\\test.fdb");
    }

    #[test]
    fn test_parse_windows_path_on_host() {
        let config: Config = "server:C:\\data\\test.fdb".parse().unwrap();
        assert_eq!(config.host, "server");
        assert_eq!(config.database, "C:\\data\\test.fdb");
    }

    #[test]
    fn test_parse_invalid() {
        for s in ["", ":/db", "host:", "//host", "//host/", "host/abc:db", "//:3050/db"] {
            let result: Result<Config> = s.parse();
            assert!(
                matches!(result, Err(Error::InvalidConnectionString(_))),
                "accepted {:?}",
                s
            );
        }
    }

    #[test]
    fn test_database_parameters() {
        let config = Config::new("h", "db", "SYSDBA", "pw").role("ADMIN").charset("UTF8");
        let bytes = config.database_parameters().to_bytes().unwrap();
        let expected: Vec<u8> = [
            vec![dpb::USER_NAME, 6],
            b"SYSDBA".to_vec(),
            vec![dpb::PASSWORD, 2, b'p', b'w'],
            vec![dpb::SQL_ROLE_NAME, 5],
            b"ADMIN".to_vec(),
            vec![dpb::LC_CTYPE, 4],
            b"UTF8".to_vec(),
            vec![dpb::SQL_DIALECT, 4, 3, 0, 0, 0],
        ]
        .concat();
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_extra_parameters() {
        let config = Config::default().parameter(Clumplet::int(dpb::NUM_BUFFERS, 75));
        let block = config.database_parameters();
        assert_eq!(block.get(dpb::NUM_BUFFERS).and_then(|c| c.as_int()), Some(75));
        assert!(!block.contains(dpb::USER_NAME));
    }

    #[test]
    fn test_config_display() {
        let config = Config::new("myhost", "employee", "u", "p");
        assert_eq!(config.to_string(), "myhost:employee");
        assert_eq!(config.port(3051).to_string(), "myhost/3051:employee");
    }

    #[test]
    fn test_config_builder_pattern() {
        let config = Config::new("host", "db", "user", "pass")
            .dialect(1)
            .connect_timeout(Duration::from_secs(30))
            .client("alice", "ws1");

        assert_eq!(config.dialect, 1);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.client_user, "alice");
        assert_eq!(config.client_host, "ws1");
    }
}
