use log::warn;
use std::env;

const DEFAULT_PUBLIC_APP_URL: &str = "http://localhost:3000";
const DEFAULT_COUNTRY_CODE: &str = "972";

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false)
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// SMS gateway settings
#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub gateway_url: String,
    pub api_key: String,
    pub sender_name: String,
    /// When set, messages are logged instead of sent
    pub dry_run: bool,
}

impl SmsConfig {
    pub fn from_env() -> Self {
        let gateway_url = env_or("SMS_GATEWAY_URL", "");
        let dry_run = env_flag("TEST_SMS");
        if gateway_url.is_empty() && !dry_run {
            warn!("SMS_GATEWAY_URL is not set; every SMS send will fail");
        }

        Self {
            gateway_url,
            api_key: env_or("SMS_API_KEY", ""),
            sender_name: env_or("SMS_SENDER_NAME", "EventDesk"),
            dry_run,
        }
    }
}

/// Public links embedded in outbound messages and checkout redirects
#[derive(Debug, Clone)]
pub struct AppLinks {
    pub public_app_url: String,
}

impl AppLinks {
    pub fn new(public_app_url: impl Into<String>) -> Self {
        Self {
            public_app_url: public_app_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(env_or("PUBLIC_APP_URL", DEFAULT_PUBLIC_APP_URL))
    }

    pub fn rsvp_link(&self, event_id: &str, guest_id: &str) -> String {
        format!("{}/rsvp/{}/{}", self.public_app_url, event_id, guest_id)
    }

    pub fn pay_link(&self, token: &str) -> String {
        format!("{}/pay/{}", self.public_app_url, token)
    }
}

/// Everything the dispatcher needs besides the store and the SMS sender
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub links: AppLinks,
    /// Calling code used for numbers entered in national format (leading 0)
    pub default_country_code: String,
}

impl DispatchConfig {
    pub fn from_env() -> Self {
        Self {
            links: AppLinks::from_env(),
            default_country_code: env_or("SMS_DEFAULT_COUNTRY_CODE", DEFAULT_COUNTRY_CODE),
        }
    }
}

/// Payment processor settings
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Hosted checkout page payers are redirected to
    pub checkout_base_url: String,
    /// Where the provider sends the payer back after checkout
    pub return_url_base: String,
    pub provider_name: String,
    /// Shared secret the provider echoes in `x-webhook-secret`
    pub webhook_secret: Option<String>,
}

impl PaymentConfig {
    pub fn from_env() -> Self {
        let webhook_secret = env::var("PAYMENT_WEBHOOK_SECRET")
            .ok()
            .filter(|v| !v.is_empty());
        if webhook_secret.is_none() {
            warn!("PAYMENT_WEBHOOK_SECRET is not set; webhook callbacks are not authenticated");
        }

        Self {
            checkout_base_url: env_or(
                "PAYMENT_CHECKOUT_BASE_URL",
                "https://checkout.example-payments.com/pay",
            ),
            return_url_base: env_or("PUBLIC_APP_URL", DEFAULT_PUBLIC_APP_URL),
            provider_name: env_or("PAYMENT_PROVIDER_NAME", "hosted-checkout"),
            webhook_secret,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_drop_trailing_slash() {
        let links = AppLinks::new("https://events.example.com/");
        assert_eq!(
            links.rsvp_link("ev1", "g1"),
            "https://events.example.com/rsvp/ev1/g1"
        );
        assert_eq!(links.pay_link("abc"), "https://events.example.com/pay/abc");
    }
}
