//! Shared test harness: gateway server plus mock upstreams
#![allow(dead_code)]

pub mod mock_sefaria;
pub mod mock_web;
pub mod server;

#[allow(unused_imports)]
pub use mock_sefaria::MockSefaria;
#[allow(unused_imports)]
pub use mock_web::MockWeb;
#[allow(unused_imports)]
pub use server::{TestServer, test_config};
