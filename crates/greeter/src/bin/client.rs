use clap::{Parser, ValueEnum};
use greeter::{
    contract::{ApiVersion, GreeterClient, GreeterMethod, HelloReply, HelloRequest, StatusRequest},
    BoxError,
};
use twinrpc::{
    client::error::ClientError,
    exports::http::{Method, Uri},
    gateway::{GatewayCallError, GatewayClient},
    Code, MetadataMap,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Api {
    V1,
    V2,
}

/// Calls a greeter server over both transports and prints what comes back.
#[derive(Debug, Parser)]
#[command(name = "greeter-client", version)]
struct Args {
    /// Binary protocol server.
    #[arg(long, default_value = "http://127.0.0.1:9091")]
    rpc_addr: Uri,
    /// JSON gateway.
    #[arg(long, default_value = "http://127.0.0.1:4501")]
    http_addr: Uri,
    #[arg(long, value_enum, default_value_t = Api::V1)]
    api: Api,
    #[arg(long, default_value = "world")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    let version = match args.api {
        Api::V1 => ApiVersion::V1,
        Api::V2 => ApiVersion::V2,
    };

    let hello = HelloRequest { name: args.name };
    let status = StatusRequest {
        status_code: Code::NotFound.as_i32(),
        error_message: "nothing to see here".to_string(),
    };

    // binary protocol
    let mut client = GreeterClient::new(args.rpc_addr, version)?;

    let resp = client.say_hello(hello.clone()).await?;
    let (header, trailer) = (resp.header().clone(), resp.trailer().clone());
    println!("rpc SayHello: {:?}", resp.into_message().await?.message);
    print_metadata("rpc", &header, &trailer);

    match client.status(status.clone()).await {
        Err(ClientError::EndpointError {
            status, metadata, ..
        }) => {
            println!("rpc Status: {}", status);
            print_metadata("rpc", &metadata.header, &metadata.trailer);
        }
        other => println!("rpc Status: unexpected {:?}", other.map(|_| ())),
    }

    // JSON gateway
    let gateway = GatewayClient::new(args.http_addr);
    let (hello_path, status_path) = match version {
        ApiVersion::V1 => ("/v1/greeter/hello", "/v1/greeter/status"),
        ApiVersion::V2 => (
            version.path(GreeterMethod::SayHello),
            version.path(GreeterMethod::Status),
        ),
    };

    let resp = gateway
        .call::<_, HelloReply>(Method::POST, hello_path, Some(&hello), &MetadataMap::new())
        .await?;
    println!("gateway SayHello: {:?}", resp.message.message);
    print_metadata("gateway", &resp.metadata.header, &resp.metadata.trailer);

    match gateway
        .call::<_, serde_json::Value>(Method::POST, status_path, Some(&status), &MetadataMap::new())
        .await
    {
        Err(GatewayCallError::Status { status, metadata }) => {
            println!("gateway Status: {}", status);
            print_metadata("gateway", &metadata.header, &metadata.trailer);
        }
        other => println!("gateway Status: unexpected {:?}", other.map(|_| ())),
    }

    Ok(())
}

fn print_metadata(transport: &str, header: &MetadataMap, trailer: &MetadataMap) {
    for (key, value) in header.iter() {
        println!("{} header {}: {}", transport, key, value);
    }
    for (key, value) in trailer.iter() {
        println!("{} trailer {}: {}", transport, key, value);
    }
}
