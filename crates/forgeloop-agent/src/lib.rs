mod credentials;
mod gemini;
mod http;
mod openai;
mod schema;
mod traits;

pub use credentials::{resolve_api_key, ApiKey, CredentialError};
pub use gemini::GeminiGenerator;
pub use openai::OpenAiGenerator;
pub use schema::{FieldKind, ResponseSchema, SchemaField};
pub use traits::{Generator, GeneratorConfig, GeneratorError, ProviderType};

/// Create a generator for the given provider
pub fn create_generator(provider: ProviderType, config: GeneratorConfig) -> Box<dyn Generator> {
    match provider {
        ProviderType::Gemini => Box::new(GeminiGenerator::new(config)),
        ProviderType::OpenAi => Box::new(OpenAiGenerator::new(config)),
    }
}
