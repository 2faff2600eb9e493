//! Validated pairing and connect targets

use crate::config::defaults;
use crate::error::ValidationError;

/// Where and how to pair, checked before any network call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairTarget {
    pub host: String,
    pub port: u16,
    pub code: String,
}

impl PairTarget {
    /// Validate raw consumer input.
    ///
    /// A missing or blank host means [`defaults::DEFAULT_HOST`]. The port must
    /// be an integer in 1-65535 and the code exactly six ASCII digits.
    pub fn parse(
        host: Option<&str>,
        port: Option<&str>,
        code: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let host = parse_host(host)?;

        let port = match port.map(str::trim).filter(|p| !p.is_empty()) {
            Some(port) => port,
            None => return Err(ValidationError::MissingPort),
        };
        let port: i64 = port
            .parse()
            .map_err(|_| ValidationError::MalformedPort(port.to_string()))?;
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or(ValidationError::PortOutOfRange(port))?;

        let code = match code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => code,
            None => return Err(ValidationError::MissingCode),
        };
        if code.len() != defaults::PAIRING_CODE_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::MalformedCode(code.to_string()));
        }

        Ok(Self {
            host,
            port,
            code: code.to_string(),
        })
    }
}

/// Where to connect. Never fails: bad ports fall back to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u32,
}

impl ConnectTarget {
    /// Resolve raw consumer input.
    ///
    /// The host is not validated here; the transport reports unreachable
    /// hosts. A missing or unparsable port means
    /// [`defaults::DEFAULT_CONNECT_PORT`]. The port is deliberately not
    /// range-checked, unlike pairing.
    pub fn parse(host: Option<&str>, port: Option<&str>) -> Self {
        let host = host
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(defaults::DEFAULT_HOST)
            .to_string();
        let port = port
            .and_then(|p| p.trim().parse::<u32>().ok())
            .unwrap_or(defaults::DEFAULT_CONNECT_PORT);
        Self { host, port }
    }
}

fn parse_host(host: Option<&str>) -> Result<String, ValidationError> {
    let host = host
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or(defaults::DEFAULT_HOST);
    if is_dotted_quad(host) {
        Ok(host.to_string())
    } else {
        Err(ValidationError::InvalidHost(host.to_string()))
    }
}

/// Four dot-separated octets of one to three digits, each at most 255.
/// Leading zeros are allowed and the text is passed on unchanged.
fn is_dotted_quad(host: &str) -> bool {
    let octets: Vec<&str> = host.split('.').collect();
    octets.len() == 4
        && octets.iter().all(|octet| {
            (1..=3).contains(&octet.len())
                && octet.bytes().all(|b| b.is_ascii_digit())
                && octet.parse::<u16>().map_or(false, |value| value <= 255)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(host: &str, port: &str, code: &str) -> Result<PairTarget, ValidationError> {
        PairTarget::parse(Some(host), Some(port), Some(code))
    }

    #[test]
    fn test_pair_accepts_valid_input() {
        let target = pair(" 192.168.1.20 ", "37123", " 123456 ").unwrap();
        assert_eq!(target.host, "192.168.1.20");
        assert_eq!(target.port, 37123);
        assert_eq!(target.code, "123456");
    }

    #[test]
    fn test_pair_host_defaults() {
        let target = PairTarget::parse(None, Some("5555"), Some("000000")).unwrap();
        assert_eq!(target.host, "127.0.0.1");
        let target = PairTarget::parse(Some("  "), Some("5555"), Some("000000")).unwrap();
        assert_eq!(target.host, "127.0.0.1");
    }

    #[test]
    fn test_pair_keeps_leading_zero_octets() {
        let target = pair("192.168.001.010", "5555", "123456").unwrap();
        assert_eq!(target.host, "192.168.001.010");
        assert!(pair("000.0.0.0", "5555", "123456").is_ok());
        assert!(pair("192.168.0001.1", "5555", "123456").is_err());
        assert!(pair("192.168.1.256", "5555", "123456").is_err());
    }

    #[test]
    fn test_pair_rejects_bad_host() {
        assert_eq!(
            pair("300.1.1.1", "5555", "123456"),
            Err(ValidationError::InvalidHost("300.1.1.1".into()))
        );
        assert!(pair("phone.local", "5555", "123456").is_err());
        assert!(pair("10.0.0", "5555", "123456").is_err());
    }

    #[test]
    fn test_pair_port_errors() {
        assert_eq!(
            PairTarget::parse(None, None, Some("123456")),
            Err(ValidationError::MissingPort)
        );
        assert_eq!(
            pair("127.0.0.1", "55x5", "123456"),
            Err(ValidationError::MalformedPort("55x5".into()))
        );
        assert_eq!(
            pair("127.0.0.1", "0", "123456"),
            Err(ValidationError::PortOutOfRange(0))
        );
        assert_eq!(
            pair("127.0.0.1", "65536", "123456"),
            Err(ValidationError::PortOutOfRange(65536))
        );
        assert_eq!(
            pair("127.0.0.1", "-1", "123456"),
            Err(ValidationError::PortOutOfRange(-1))
        );
        assert!(pair("127.0.0.1", "65535", "123456").is_ok());
        assert!(pair("127.0.0.1", "1", "123456").is_ok());
    }

    #[test]
    fn test_pair_code_errors() {
        assert_eq!(
            PairTarget::parse(None, Some("5555"), Some(" ")),
            Err(ValidationError::MissingCode)
        );
        assert_eq!(
            pair("127.0.0.1", "5555", "12a456"),
            Err(ValidationError::MalformedCode("12a456".into()))
        );
        assert!(pair("127.0.0.1", "5555", "12345").is_err());
        assert!(pair("127.0.0.1", "5555", "1234567").is_err());
        assert!(pair("127.0.0.1", "5555", "１２３４５６").is_err());
    }

    #[test]
    fn test_connect_defaults_and_passthrough() {
        assert_eq!(
            ConnectTarget::parse(None, None),
            ConnectTarget {
                host: "127.0.0.1".into(),
                port: 5555
            }
        );
        assert_eq!(ConnectTarget::parse(Some("10.0.0.2"), Some("abc")).port, 5555);
        assert_eq!(ConnectTarget::parse(Some("10.0.0.2"), Some("70000")).port, 70000);
        assert_eq!(ConnectTarget::parse(Some(" 10.0.0.2 "), Some(" 40001 ")).host, "10.0.0.2");
    }
}
