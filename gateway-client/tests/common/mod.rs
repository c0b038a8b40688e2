use axum::Router;
use gateway_client::GatewayClient;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn client(base_url: &str) -> GatewayClient {
    GatewayClient::builder(base_url).build().unwrap()
}
