pub mod comment;
pub mod decision;
pub mod invite;
pub mod link;
pub mod member;
pub mod user;
pub mod workspace;
