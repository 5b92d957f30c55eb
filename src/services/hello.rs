//! Liveness greeting.

use std::sync::Arc;

use crate::error::{DeclarationError, HandlerError};
use crate::logger::{Logger, LoggerFactory};
use crate::routes::{ApiRequest, RouteSpec, RouteTable, Service};
use crate::schemas::{GET_HELLO_QUERY, GET_HELLO_RESPONSE, GetHelloQuery, HelloWorldResponse};

pub struct HelloService {
    logger: Logger,
}

impl HelloService {
    pub fn new(factory: &LoggerFactory) -> Self {
        Self {
            logger: factory.create_logger("HelloService"),
        }
    }

    pub async fn get_hello(
        self: Arc<Self>,
        request: ApiRequest,
    ) -> Result<HelloWorldResponse, HandlerError> {
        let _: GetHelloQuery = request.query()?;
        self.logger.info("Hello World");
        Ok(HelloWorldResponse {
            hello: "world".to_string(),
        })
    }
}

impl Service for HelloService {
    fn declare(routes: &mut RouteTable<Self>) -> Result<(), DeclarationError> {
        routes.module("hello").get(
            "/",
            "get_hello",
            RouteSpec::new()
                .auth()
                .query(GET_HELLO_QUERY)
                .response(GET_HELLO_RESPONSE),
            Self::get_hello,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{LogBuffer, LogLevel, MemorySink};
    use crate::trace_context::{self, TraceId};

    #[tokio::test]
    async fn test_get_hello_logs_info() {
        let factory =
            LoggerFactory::new(Arc::new(LogBuffer::default()), Arc::new(MemorySink::new()));
        let service = Arc::new(HelloService::new(&factory));
        let id = TraceId::from("hello-1");

        let response = trace_context::run(id.clone(), service.get_hello(ApiRequest::default()))
            .await
            .unwrap();
        assert_eq!(response.hello, "world");

        let records = factory.buffer().get(&id);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, LogLevel::Info);
        assert_eq!(records[0].messages, vec!["Hello World"]);
    }

    #[test]
    fn test_declares_single_gated_route() {
        let mut table = RouteTable::<HelloService>::new();
        HelloService::declare(&mut table).unwrap();
        assert_eq!(table.module_name(), Some("hello"));
        assert_eq!(table.routes().len(), 1);
        assert!(table.routes()[0].requires_auth);
        assert_eq!(
            table.routes()[0].schema_refs.response.as_deref(),
            Some(GET_HELLO_RESPONSE)
        );
    }
}
