//! Unit tests for the vmboot library

mod test_cpi_installer;
mod test_deploy_cmd;
mod test_registry;
