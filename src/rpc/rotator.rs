use crate::error::ConfigError;

/// Ordered endpoint list with a circular cursor. Purely local state.
#[derive(Debug, Clone)]
pub struct EndpointRotator {
    endpoints: Vec<String>,
    current: usize,
}

impl EndpointRotator {
    pub fn new(endpoints: Vec<String>) -> Result<Self, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        Ok(Self {
            endpoints,
            current: 0,
        })
    }

    pub fn current(&self) -> &str {
        &self.endpoints[self.current]
    }

    /// Advance to the next endpoint and return it.
    pub fn rotate(&mut self) -> &str {
        self.current = (self.current + 1) % self.endpoints.len();
        &self.endpoints[self.current]
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }
}
