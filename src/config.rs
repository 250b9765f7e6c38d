use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Mark the session cookie `Secure`.
    pub secure_cookies: bool,
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub api_base: String,
    pub client_id: String,
    pub client_secret: String,
    pub currency: String,
    pub return_url: String,
    pub cancel_url: String,
    pub timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let payment = PaymentConfig::from_env(port);
        let secure_cookies = secure_cookies(env::var("COOKIE_SECURE").ok(), &payment.return_url);
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            secure_cookies,
            payment,
        })
    }
}

impl PaymentConfig {
    fn from_env(port: u16) -> Self {
        let public_base = format!("http://localhost:{port}");
        Self {
            api_base: env::var("PAYPAL_API_BASE")
                .unwrap_or_else(|_| "https://api-m.sandbox.paypal.com".to_string()),
            client_id: env::var("PAYPAL_CLIENT_ID").unwrap_or_default(),
            client_secret: env::var("PAYPAL_CLIENT_SECRET").unwrap_or_default(),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
            return_url: env::var("PAYMENT_RETURN_URL")
                .unwrap_or_else(|_| format!("{public_base}/checkout/success")),
            cancel_url: env::var("PAYMENT_CANCEL_URL")
                .unwrap_or_else(|_| format!("{public_base}/checkout/cancel")),
            timeout_secs: env::var("PAYMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse::<u64>().ok())
                .unwrap_or(10),
        }
    }
}

/// Explicit `true`/`false` wins; otherwise secure when buyers come back over https.
fn secure_cookies(explicit: Option<String>, return_url: &str) -> bool {
    explicit
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or_else(|| return_url.starts_with("https://"))
}
