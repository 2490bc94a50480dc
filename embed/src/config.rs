/// Builder-style configuration for encoder implementations.
#[derive(Debug, Clone, Default)]
pub struct EncoderConfig {
    pub model: String,
    pub dimension: usize,
    pub base_url: String,
    pub api_key: String,
    /// L2-normalize every returned vector.
    pub normalize: bool,
}

impl EncoderConfig {
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = dim;
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = key.to_string();
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }
}
