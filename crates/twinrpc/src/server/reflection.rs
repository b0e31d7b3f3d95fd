//! Service discovery: lists the services a server serves.

use std::sync::Arc;

use super::service::{unary_handler, RpcService};
use crate::{
    proto::{ListServicesRequest, ListServicesResponse},
    Request, Response,
};

/// Fully-qualified name of the reflection service.
pub const SERVICE_NAME: &str = "twinrpc.reflection.v1.ServerReflection";

/// Path of the `ListServices` method.
pub fn list_services_path() -> String {
    format!("/{}/ListServices", SERVICE_NAME)
}

pub(crate) fn list_services(services: Vec<String>) -> RpcService {
    let services: Arc<[String]> = services.into();
    unary_handler(move |_: Request<ListServicesRequest>| async move {
        Ok(Response::new(&ListServicesResponse {
            services: services.to_vec(),
        }))
    })
}
