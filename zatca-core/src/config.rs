//! Explicit configuration passed to builders, signers and the ledger.
use crate::invoice::{Address, Seller, VatNumber};
use crate::ledger::initial_previous_hash;
use iso_currency::Currency;
use isocountry::CountryCode;
use java_properties::read;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse properties: {source}")]
    PropertiesRead {
        #[source]
        source: java_properties::PropertiesError,
    },
    #[error("missing property '{key}' required by '{required_by}'")]
    MissingProperty {
        key: &'static str,
        required_by: &'static str,
    },
    #[error("invalid value '{value}' for property '{key}'")]
    InvalidValue { key: String, value: String },
}

/// Defaults applied to new invoices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDefaults {
    pub currency: Currency,
    pub payment_means_code: String,
    pub seller: Option<Seller>,
}

impl Default for InvoiceDefaults {
    fn default() -> Self {
        Self {
            currency: Currency::SAR,
            payment_means_code: "10".to_string(),
            seller: None,
        }
    }
}

/// Diagnostic switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugOptions {
    /// Emit the canonical form of every hashed document at `trace` level.
    pub trace_canonical: bool,
}

/// Hash-chain settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOptions {
    /// PIH used by the first invoice in the chain.
    pub genesis_hash: String,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            genesis_hash: initial_previous_hash(),
        }
    }
}

/// Configuration value for the core components.
///
/// # Examples
/// ```rust
/// use zatca_core::config::Config;
///
/// let props = "invoice.currency=SAR\ndebug.trace_canonical=true\n";
/// let config = Config::from_properties(props.as_bytes())?;
/// assert!(config.debug.trace_canonical);
/// assert_eq!(config.defaults.payment_means_code, "10");
/// # Ok::<(), zatca_core::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    pub defaults: InvoiceDefaults,
    pub debug: DebugOptions,
    pub ledger: LedgerOptions,
}

impl Config {
    pub fn new(defaults: InvoiceDefaults) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    pub fn with_debug(mut self, debug: DebugOptions) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_genesis_hash(mut self, genesis_hash: impl Into<String>) -> Self {
        self.ledger.genesis_hash = genesis_hash.into();
        self
    }

    /// Load configuration from a `.properties` file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the file cannot be read or a value is invalid.
    pub fn from_properties_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_properties(BufReader::new(file))
    }

    /// Load configuration from any reader producing `.properties` text.
    ///
    /// Unknown keys are ignored.
    pub fn from_properties<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let props = read(reader).map_err(|source| ConfigError::PropertiesRead { source })?;
        let mut config = Config::default();

        if let Some(code) = lookup(&props, "invoice.currency") {
            config.defaults.currency =
                Currency::from_code(code).ok_or_else(|| invalid("invoice.currency", code))?;
        }
        if let Some(code) = lookup(&props, "invoice.payment_means") {
            config.defaults.payment_means_code = code.to_string();
        }
        if let Some(flag) = lookup(&props, "debug.trace_canonical") {
            config.debug.trace_canonical = parse_bool("debug.trace_canonical", flag)?;
        }
        if let Some(hash) = lookup(&props, "ledger.genesis_hash") {
            config.ledger.genesis_hash = hash.to_string();
        }
        config.defaults.seller = seller_from_properties(&props)?;

        Ok(config)
    }
}

fn seller_from_properties(props: &HashMap<String, String>) -> Result<Option<Seller>, ConfigError> {
    let Some(vat) = lookup(props, "seller.vat") else {
        return Ok(None);
    };
    let req = |key: &'static str| {
        lookup(props, key)
            .map(str::to_string)
            .ok_or(ConfigError::MissingProperty {
                key,
                required_by: "seller.vat",
            })
    };

    let country = match lookup(props, "seller.country") {
        Some(code) => parse_country(code)?,
        None => CountryCode::SAU,
    };
    let address = Address {
        country_code: country,
        city: req("seller.city")?,
        street: req("seller.street")?,
        additional_street: lookup(props, "seller.additional_street").map(str::to_string),
        building_number: req("seller.building")?,
        additional_number: lookup(props, "seller.additional_number").map(str::to_string),
        postal_code: req("seller.postal_code")?,
        subdivision: lookup(props, "seller.subdivision").map(str::to_string),
        district: lookup(props, "seller.district").map(str::to_string),
    };
    let vat = VatNumber::parse(vat).map_err(|_| invalid("seller.vat", vat))?;

    let mut seller = Seller::new(
        lookup(props, "seller.name").unwrap_or_default(),
        address,
        vat,
    );
    if let Some(local) = lookup(props, "seller.name_local") {
        seller = seller.with_local_name(local);
    }
    if let Some(crn) = lookup(props, "seller.registration") {
        seller = seller.with_registration(crn);
    }
    Ok(Some(seller))
}

fn lookup<'a>(props: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    props
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_country(code: &str) -> Result<CountryCode, ConfigError> {
    let upper = code.to_ascii_uppercase();
    CountryCode::for_alpha2(&upper)
        .or_else(|_| CountryCode::for_alpha3(&upper))
        .map_err(|_| invalid("seller.country", code))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELLER_PROPS: &str = "\
invoice.currency=SAR
invoice.payment_means=42
seller.name=Maximum Speed Tech Supply LTD
seller.name_local=\\u0634\\u0631\\u0643\\u0629
seller.vat=399999999900003
seller.registration=1010010000
seller.street=Prince Sultan
seller.building=2322
seller.postal_code=23333
seller.city=Riyadh
seller.district=Al-Murabba
seller.country=SA
ledger.genesis_hash=abc=
";

    #[test]
    fn defaults_without_properties() {
        let config = Config::default();
        assert_eq!(config.defaults.currency, Currency::SAR);
        assert_eq!(config.defaults.payment_means_code, "10");
        assert!(config.defaults.seller.is_none());
        assert!(!config.debug.trace_canonical);
        assert_eq!(config.ledger.genesis_hash, initial_previous_hash());
    }

    #[test]
    fn seller_loaded_from_properties() {
        let config = Config::from_properties(SELLER_PROPS.as_bytes()).expect("config");
        let seller = config.defaults.seller.expect("seller");
        assert_eq!(seller.name(), "Maximum Speed Tech Supply LTD");
        assert_eq!(seller.local_name(), Some("شركة"));
        assert_eq!(
            seller.vat_number().map(VatNumber::as_str),
            Some("399999999900003")
        );
        assert_eq!(seller.address().district(), Some("Al-Murabba"));
        assert_eq!(seller.address().country_code(), &CountryCode::SAU);
        assert_eq!(config.defaults.payment_means_code, "42");
        assert_eq!(config.ledger.genesis_hash, "abc=");
    }

    #[test]
    fn seller_requires_address_fields() {
        let err = Config::from_properties("seller.vat=399999999900003\n".as_bytes())
            .expect_err("missing address");
        assert!(matches!(
            err,
            ConfigError::MissingProperty {
                key: "seller.city",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_currency_and_bad_flags() {
        let err = Config::from_properties("invoice.currency=XXQ\n".as_bytes()).expect_err("currency");
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "invoice.currency"));

        let err =
            Config::from_properties("debug.trace_canonical=maybe\n".as_bytes()).expect_err("flag");
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "debug.trace_canonical"));
    }
}
