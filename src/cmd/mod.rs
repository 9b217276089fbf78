pub mod call;
pub mod login;
pub mod tenant;
