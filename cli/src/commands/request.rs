use anyhow::anyhow;
use clap::Args;
use futures::future::try_join_all;
use reqwest::Method;
use serde_json::Value;
use tollgate_api::{ApiClient, ApiError, ApiRequest, ApiResponse};
use uuid::Uuid;

use super::auth::{Credentials, sign_in};

#[derive(Args, Debug, Clone, PartialEq)]
pub struct RequestArgs {
    /// HTTP method, e.g. GET or POST
    pub method: String,

    /// Path relative to the base URL, e.g. /users
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub data: Option<String>,

    /// Query parameter as key=value, may be repeated
    #[arg(long = "query", short = 'q')]
    pub query: Vec<String>,

    /// Send the request this many times concurrently
    #[arg(long, default_value_t = 1)]
    pub repeat: usize,

    #[command(flatten)]
    pub credentials: Credentials,
}

pub async fn run(client: &ApiClient, args: RequestArgs) -> anyhow::Result<()> {
    let request = build_request(&args)?;

    if args.credentials.is_present() {
        sign_in(client, args.credentials.clone()).await?;
    }

    let results = send_all(client, &request, args.repeat.max(1)).await?;

    let mut failures = 0;
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(response) => print_response(index, args.repeat, &response),
            Err(_) => failures += 1,
        }
    }

    if failures > 0 {
        return Err(anyhow!("{failures} of {} request(s) failed", args.repeat.max(1)));
    }
    Ok(())
}

/// Send `repeat` copies of `request` at once, each on its own task.
///
/// Every copy shares the client, and with it a single refresh coordinator.
/// Separate tasks let queued copies replay as soon as they are released,
/// in the order their 401s arrived. Results come back in submission order.
pub async fn send_all(
    client: &ApiClient,
    request: &ApiRequest,
    repeat: usize,
) -> anyhow::Result<Vec<Result<ApiResponse, ApiError>>> {
    let handles = (0..repeat).map(|_| {
        let client = client.clone();
        let mut request = request.clone();
        request.id = Uuid::new_v4();
        tokio::spawn(async move { client.execute(request).await })
    });

    try_join_all(handles)
        .await
        .map_err(|e| anyhow!("request task failed: {e}"))
}

fn build_request(args: &RequestArgs) -> anyhow::Result<ApiRequest> {
    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .map_err(|_| anyhow!("invalid HTTP method: {}", args.method))?;

    let mut request = ApiRequest::new(method, args.path.clone());

    for pair in &args.query {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("query parameter must be key=value, got {pair}"))?;
        request = request.with_query(key, value);
    }

    if let Some(data) = &args.data {
        let body: Value =
            serde_json::from_str(data).map_err(|e| anyhow!("--data is not valid JSON: {e}"))?;
        request = request.with_json(body);
    }

    Ok(request)
}

fn print_response(index: usize, total: usize, response: &ApiResponse) {
    if total > 1 {
        println!("--- response {} ({})", index + 1, response.status);
    }

    match response.json_value() {
        Some(body) => match serde_json::to_string_pretty(&body) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{}", response.text()),
        },
        None if response.body.is_empty() => println!("{}", response.status),
        None => println!("{}", response.text()),
    }
}
