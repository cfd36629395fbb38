pub mod buffer;
pub mod sse;

#[cfg(test)]
pub mod test_helpers;
