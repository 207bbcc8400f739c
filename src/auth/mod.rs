pub mod accounts;
pub mod csrf;
pub mod middleware;
pub mod password;
pub mod rate_limit;
pub mod session;
