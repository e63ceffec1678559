use crate::analyzer::Analyzer;
use crate::providers::Provider;
use crate::settings;

pub struct ServerState<P: Provider> {
    pub(crate) settings: settings::Settings,
    pub(crate) analyzer: Analyzer<P>,
}

impl<P: Provider> ServerState<P> {
    pub fn new(settings: settings::Settings, analyzer: Analyzer<P>) -> Self {
        Self { settings, analyzer }
    }
}
