/// Bails with a [`crate::Status`], or anything that converts into one.
///
/// # Example
/// ```rust,no_run
/// # use twinrpc::{bail, Code, Status};
/// # fn main() -> Result<(), Status> {
///     bail!((Code::InvalidArgument, "please input you name"));
/// #   Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($err.into());
    };
}

/// Combines a list of services that implement `MakeRoutes`.
///
/// # Example
/// ```rust,ignore
/// let v1 = GreeterServer::new(GreeterService::default(), ApiVersion::V1);
/// let v2 = GreeterServer::new(GreeterService::default(), ApiVersion::V2);
/// combine_services!(v1, v2).serve(transport).await?;
/// ```
#[macro_export]
macro_rules! combine_services {
    ($fsvc:ident, $($svc:ident),+) => {
        {
            use $crate::server::MakeRoutes;

            let svc = $fsvc;
            $(
                let svc = MakeRoutes::combine_with(svc, $svc);
            )+
            svc
        }
    };
}
