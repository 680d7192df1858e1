pub mod compare;
pub mod layout;
pub mod link;
pub mod manual;
pub mod matchers;
pub mod prompt;
