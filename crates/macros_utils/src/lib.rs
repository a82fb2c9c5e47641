//! Small declarative macros shared by the httpbroker apps.

#[cfg(feature = "actix")]
#[doc(hidden)]
pub use actix_web;

/// Generate a `routes` function registering attribute-routed actix handlers.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
/// }
///
/// App::new().configure(health::routes);
/// ```
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    ($(route $handler:ident),* $(,)?) => {
        pub fn routes(cfg: &mut $crate::actix_web::web::ServiceConfig) {
            $( cfg.service($handler); )*
        }
    };
}
