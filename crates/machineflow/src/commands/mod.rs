pub mod create;
pub mod inspect;
pub mod lifecycle;
pub mod ls;
pub mod rm;
