mod http_tests;
mod session_tests;
