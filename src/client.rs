use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderValue, USER_AGENT};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub product_types: Vec<String>,
}

impl Network {
    pub fn is_wireless(&self) -> bool {
        self.product_types.iter().any(|p| p == "wireless")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub serial: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Device {
    // Access points carry the MR model family; switches and gateways do not.
    pub fn is_access_point(&self) -> bool {
        self.model.contains("MR")
    }
}

#[derive(Debug, Clone)]
pub struct DashboardClient {
    base_url: Url,
    http: Client,
    api_key: String,
}

impl DashboardClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let mut parsed = Url::parse(base_url).context("parsing base URL")?;
        // Url::join drops the last path segment unless the base ends in '/'.
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }
        let http = Client::builder()
            .user_agent(HeaderValue::from_static("rfctl/0.1"))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            base_url: parsed,
            http,
            api_key: api_key.to_string(),
        })
    }

    pub fn organizations(&self) -> Result<Vec<Organization>> {
        let value = self.request(Method::GET, "organizations", Option::<&Value>::None)?;
        serde_json::from_value(value).context("decoding organization list")
    }

    pub fn networks(&self, org_id: &str) -> Result<Vec<Network>> {
        let value = self.request(
            Method::GET,
            &format!("organizations/{org_id}/networks"),
            Option::<&Value>::None,
        )?;
        serde_json::from_value(value).context("decoding network list")
    }

    pub fn rf_profiles(&self, network_id: &str) -> Result<Vec<Value>> {
        let value = self.request(
            Method::GET,
            &format!("networks/{network_id}/wireless/rfProfiles"),
            Option::<&Value>::None,
        )?;
        match value {
            Value::Array(profiles) => Ok(profiles),
            other => Err(anyhow!("expected a profile list, got: {other}")),
        }
    }

    pub fn create_rf_profile(&self, network_id: &str, profile: &Value) -> Result<Value> {
        self.request(
            Method::POST,
            &format!("networks/{network_id}/wireless/rfProfiles"),
            Some(profile),
        )
    }

    pub fn update_rf_profile(
        &self,
        network_id: &str,
        profile_id: &str,
        profile: &Value,
    ) -> Result<Value> {
        self.request(
            Method::PUT,
            &format!("networks/{network_id}/wireless/rfProfiles/{profile_id}"),
            Some(profile),
        )
    }

    pub fn devices(&self, network_id: &str) -> Result<Vec<Device>> {
        let value = self.request(
            Method::GET,
            &format!("networks/{network_id}/devices"),
            Option::<&Value>::None,
        )?;
        serde_json::from_value(value).context("decoding device list")
    }

    pub fn assign_radio_profile(&self, serial: &str, profile_id: &str) -> Result<()> {
        let body = serde_json::json!({ "rfProfileId": profile_id });
        self.request(
            Method::PUT,
            &format!("devices/{serial}/wireless/radio/settings"),
            Some(&body),
        )?;
        Ok(())
    }

    fn request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&T>,
    ) -> Result<Value> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("joining path `{}` to base URL", path))?;

        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(USER_AGENT, HeaderValue::from_static("rfctl/0.1"));

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .with_context(|| format!("sending {method} {path}"))?;

        let status = response.status();
        let text = response.text().context("reading response body")?;
        if !status.is_success() {
            bail!("{method} {path} returned {status}: {}", api_error(&text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).with_context(|| format!("parsing response from {path}"))
    }
}

// The controller reports failures as {"errors": ["..."]}; fall back to the
// raw body when the shape differs.
fn api_error(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    if let Some(message) = parsed
        .as_ref()
        .and_then(|v| v.get("errors"))
        .and_then(|e| e.get(0))
        .and_then(|e| e.as_str())
    {
        return message.to_string();
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}
