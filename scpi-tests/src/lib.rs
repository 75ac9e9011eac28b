//! End-to-end tests that run the server on a loopback socket. See `tests/`.
