pub mod blacklist;
pub mod filename_parser;
pub mod finalization;
pub mod import_service;
pub mod ledger;
pub mod poll_service;
pub mod scanner;
pub mod thumbnail_service;

#[cfg(test)]
pub(crate) mod test_support;
