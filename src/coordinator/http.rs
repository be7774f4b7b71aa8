use gloo_net::http::Request;
use log::debug;

use super::AnalysisBackend;
use super::request::{AnalysisReport, AnalysisRequest, RequestError, interpret_reply};

/// Sends analysis triggers to `POST <base>/analyze` with the browser fetch API.
#[derive(Clone, Debug)]
pub struct HttpBackend {
	base_url: String,
}

impl HttpBackend {
	/// Backend rooted at `base_url`.
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
		}
	}

	/// Full URL of the trigger endpoint.
	pub fn analyze_url(&self) -> String {
		format!("{}/analyze", self.base_url.trim_end_matches('/'))
	}
}

impl AnalysisBackend for HttpBackend {
	async fn analyze(&self, request: &AnalysisRequest) -> Result<Option<AnalysisReport>, RequestError> {
		let url = self.analyze_url();
		debug!("POST {url}");
		let resp = Request::post(&url)
			.json(request)
			.map_err(|e| RequestError::Build(e.to_string()))?
			.send()
			.await
			.map_err(|e| RequestError::Network(e.to_string()))?;

		if !resp.ok() {
			let body = resp.text().await.unwrap_or_default();
			return Err(RequestError::Status {
				status: resp.status(),
				body,
			});
		}

		let body = resp.text().await.unwrap_or_default();
		interpret_reply(&body)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn analyze_url_joins_base() {
		assert_eq!(
			HttpBackend::new("http://localhost:8000/").analyze_url(),
			"http://localhost:8000/analyze"
		);
		assert_eq!(
			HttpBackend::new("https://stocktool.example").analyze_url(),
			"https://stocktool.example/analyze"
		);
	}
}
