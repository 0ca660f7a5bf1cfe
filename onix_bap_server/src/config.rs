use std::{env, net::IpAddr, time::Duration};

use log::*;
use obg_common::{Paise, Secret};
use onix_bap_engine::normalizer::EnvelopeSettings;

const DEFAULT_OBG_HOST: &str = "127.0.0.1";
const DEFAULT_OBG_PORT: u16 = 8322;
const DEFAULT_ONIX_BAP_URL: &str = "http://localhost:5010";
const DEFAULT_DOMAIN: &str = "uei:p2p_trading";
const DEFAULT_CORE_VERSION: &str = "1.1.0";
const DEFAULT_TTL: &str = "PT30S";
const DEFAULT_CALLBACK_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 10_000;
/// ₹1.50 per unit transmitted.
const DEFAULT_WHEELING_CHARGE_PAISE: i64 = 150;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the upstream ONIX BAP adapter every action is forwarded to.
    pub onix_bap_url: String,
    /// This platform's subscriber id, stamped into every envelope context.
    pub bap_id: String,
    /// This platform's public callback URL, stamped into every envelope context.
    pub bap_uri: String,
    pub domain: String,
    pub core_version: String,
    pub ttl: String,
    /// How long a caller may stay parked waiting for a callback before a 504.
    pub callback_timeout: Duration,
    /// Bound on the synchronous dispatch round-trip to the ONIX BAP.
    pub upstream_timeout: Duration,
    /// Per-unit transmission surcharge applied to quotes and finalization totals.
    pub wheeling_charge: Paise,
    pub profile_service: ProfileServiceConfig,
    /// Where order confirmations are announced. Unset means confirmations are only logged.
    pub notify_webhook_url: Option<String>,
    /// If supplied, inbound callbacks are checked against this whitelist of peer addresses.
    /// To explicitly disable the whitelist, set it to "false", "none", or "0".
    pub callback_whitelist: Option<Vec<IpAddr>>,
    /// If true, the X-Forwarded-For header will be used to determine the callback peer address,
    /// rather than the connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the callback peer address, rather
    /// than the connection's remote address.
    pub use_forwarded: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ProfileServiceConfig {
    pub base_url: Option<String>,
    pub api_key: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OBG_HOST.to_string(),
            port: DEFAULT_OBG_PORT,
            onix_bap_url: DEFAULT_ONIX_BAP_URL.to_string(),
            bap_id: String::default(),
            bap_uri: String::default(),
            domain: DEFAULT_DOMAIN.to_string(),
            core_version: DEFAULT_CORE_VERSION.to_string(),
            ttl: DEFAULT_TTL.to_string(),
            callback_timeout: Duration::from_millis(DEFAULT_CALLBACK_TIMEOUT_MS),
            upstream_timeout: Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS),
            wheeling_charge: Paise::from(DEFAULT_WHEELING_CHARGE_PAISE),
            profile_service: ProfileServiceConfig::default(),
            notify_webhook_url: None,
            callback_whitelist: None,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("OBG_HOST").ok().unwrap_or_else(|| DEFAULT_OBG_HOST.into());
        let port = env::var("OBG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for OBG_PORT. {e} Using the default, {DEFAULT_OBG_PORT}, instead."
                    );
                    DEFAULT_OBG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_OBG_PORT);
        let onix_bap_url = env::var("OBG_ONIX_BAP_URL").ok().unwrap_or_else(|| {
            error!(
                "🪛️ OBG_ONIX_BAP_URL is not set. Please set it to the base URL of the upstream ONIX BAP adapter. \
                 Falling back to {DEFAULT_ONIX_BAP_URL}."
            );
            DEFAULT_ONIX_BAP_URL.into()
        });
        let bap_id = env::var("OBG_BAP_ID").ok().unwrap_or_else(|| {
            error!("🪛️ OBG_BAP_ID is not set. Envelopes will carry an empty bap_id.");
            String::default()
        });
        let bap_uri = env::var("OBG_BAP_URI").ok().unwrap_or_else(|| {
            error!("🪛️ OBG_BAP_URI is not set. The counterparty will not know where to post callbacks.");
            String::default()
        });
        let domain = env::var("OBG_DOMAIN").ok().unwrap_or_else(|| DEFAULT_DOMAIN.into());
        let core_version = env::var("OBG_CORE_VERSION").ok().unwrap_or_else(|| DEFAULT_CORE_VERSION.into());
        let ttl = env::var("OBG_TTL").ok().unwrap_or_else(|| DEFAULT_TTL.into());
        let callback_timeout = duration_from_env("OBG_CALLBACK_TIMEOUT_MS", DEFAULT_CALLBACK_TIMEOUT_MS);
        let upstream_timeout = duration_from_env("OBG_UPSTREAM_TIMEOUT_MS", DEFAULT_UPSTREAM_TIMEOUT_MS);
        let wheeling_charge = wheeling_charge_from_env();
        let profile_service = ProfileServiceConfig::from_env_or_default();
        let notify_webhook_url = env::var("OBG_NOTIFY_WEBHOOK_URL").ok().filter(|s| !s.trim().is_empty());
        if notify_webhook_url.is_none() {
            info!("🪛️ OBG_NOTIFY_WEBHOOK_URL is not set. Order confirmations will only be logged.");
        }
        let callback_whitelist = callback_whitelist_from_env();
        let use_x_forwarded_for = env_flag("OBG_USE_X_FORWARDED_FOR");
        let use_forwarded = env_flag("OBG_USE_FORWARDED");
        Self {
            host,
            port,
            onix_bap_url,
            bap_id,
            bap_uri,
            domain,
            core_version,
            ttl,
            callback_timeout,
            upstream_timeout,
            wheeling_charge,
            profile_service,
            notify_webhook_url,
            callback_whitelist,
            use_x_forwarded_for,
            use_forwarded,
        }
    }

    /// The static context fields every outbound envelope is stamped with.
    pub fn envelope_settings(&self) -> EnvelopeSettings {
        EnvelopeSettings {
            domain: self.domain.clone(),
            version: self.core_version.clone(),
            bap_id: self.bap_id.clone(),
            bap_uri: self.bap_uri.clone(),
            ttl: Some(self.ttl.clone()),
        }
    }
}

impl ProfileServiceConfig {
    pub fn from_env_or_default() -> Self {
        let base_url = env::var("OBG_PROFILE_SERVICE_URL").ok().filter(|s| !s.trim().is_empty());
        if base_url.is_none() {
            warn!(
                "🪛️ OBG_PROFILE_SERVICE_URL is not set. Catalogue-shorthand select requests will fail until a \
                 profile service is configured."
            );
        }
        let api_key = Secret::new(env::var("OBG_PROFILE_SERVICE_KEY").ok().unwrap_or_default());
        Self { base_url, api_key }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name).map(|s| &s == "1" || &s == "true").unwrap_or(false)
}

fn duration_from_env(name: &str, default_ms: u64) -> Duration {
    let ms = env::var(name)
        .map_err(|_| info!("🪛️ {name} is not set. Using the default value of {default_ms}ms."))
        .and_then(|s| {
            s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid configuration value for {name}. {e}"))
        })
        .ok()
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

fn wheeling_charge_from_env() -> Paise {
    env::var("OBG_WHEELING_CHARGE")
        .map_err(|_| {
            info!(
                "🪛️ OBG_WHEELING_CHARGE is not set. Using the default of {} per unit.",
                Paise::from(DEFAULT_WHEELING_CHARGE_PAISE)
            )
        })
        .and_then(|s| {
            s.parse::<Paise>().map_err(|e| warn!("🪛️ Invalid configuration value for OBG_WHEELING_CHARGE. {e}"))
        })
        .ok()
        .unwrap_or(Paise::from(DEFAULT_WHEELING_CHARGE_PAISE))
}

fn callback_whitelist_from_env() -> Option<Vec<IpAddr>> {
    let whitelist = env::var("OBG_CALLBACK_IP_WHITELIST").ok().and_then(|s| {
        if ["none", "false", "0"].contains(&s.to_lowercase().as_str()) {
            info!(
                "🪛️ The callback IP whitelist is disabled. If this is not what you want, set \
                 OBG_CALLBACK_IP_WHITELIST to a comma-separated list of IP addresses to enable it."
            );
            return None;
        }
        let ip_addrs = s
            .split(',')
            .filter_map(|s| {
                s.trim()
                    .parse()
                    .map_err(|e| {
                        warn!("🪛️ Ignoring invalid IP address ({s}) in OBG_CALLBACK_IP_WHITELIST: {e}");
                        None::<IpAddr>
                    })
                    .ok()
            })
            .collect::<Vec<IpAddr>>();
        Some(ip_addrs)
    });
    match &whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The callback IP whitelist was configured, but is empty. The server will run, but won't accept \
                 any inbound callbacks."
            );
        },
        None => {
            info!("🪛️ No callback IP whitelist is set. All peers may post callbacks.");
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ Callback IP whitelist: {addrs}");
        },
    }
    whitelist
}
