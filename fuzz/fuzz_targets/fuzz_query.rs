#![no_main]

//! Fuzz target for query decoding of the bundled services.
//!
//! Arbitrary query strings must decode or fail with a 400, never panic.

use libfuzzer_sys::fuzz_target;
use routekit::routes::ApiRequest;
use routekit::schemas::{GetArticlesQuery, GetHelloQuery};

fuzz_target!(|data: &[u8]| {
    let Ok(query) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(uri) = format!("/articles?{query}").parse::<http::Uri>() else {
        return;
    };
    let request = ApiRequest {
        uri,
        ..ApiRequest::default()
    };

    if let Err(err) = request.query::<GetArticlesQuery>() {
        assert_eq!(err.status, http::StatusCode::BAD_REQUEST);
    }
    if let Err(err) = request.query::<GetHelloQuery>() {
        assert_eq!(err.status, http::StatusCode::BAD_REQUEST);
    }
});
