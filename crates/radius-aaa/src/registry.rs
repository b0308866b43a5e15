//! Thread-safe directory of every plugin the engine dispatches to

use crate::config::{ConfigProvider, RadiusSettings};
use crate::eap::{EapHandler, EapMd5Handler, EapMsChapV2Handler};
use crate::plugins::accounting::{
    AccountingError, AccountingHandler, InterimUpdateHandler, NasStateHandler, StartHandler,
    StopHandler,
};
use crate::plugins::checkers::{
    ExpireChecker, MacBindChecker, OnlineCountChecker, StatusChecker, VlanBindChecker,
};
use crate::plugins::enhancers::{DefaultEnhancer, VendorRateEnhancer};
use crate::plugins::guards::RejectDelayGuard;
use crate::plugins::validators::{ChapValidator, MsChapV2Validator, PapValidator};
use crate::plugins::vendors::{
    DefaultParser, DefaultResponseBuilder, H3cParser, H3cResponseBuilder, HuaweiParser,
    HuaweiResponseBuilder, IkuaiResponseBuilder, MikrotikResponseBuilder, ZteParser,
    ZteResponseBuilder, DEFAULT_VENDOR,
};
use crate::plugins::{
    AuthGuard, PasswordValidator, PolicyChecker, ResponseEnhancer, VendorParser,
    VendorResponseBuilder,
};
use crate::repository::{AccountingRepository, SessionRepository};
use radius_wire::AcctStatusType;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::debug;

/// What the built-in plugins need from the rest of the engine
#[derive(Clone)]
pub struct RegistryDeps {
    pub config: Arc<dyn ConfigProvider>,
    pub settings: RadiusSettings,
    pub sessions: Arc<dyn SessionRepository>,
    pub accounting: Arc<dyn AccountingRepository>,
}

#[derive(Default)]
struct Plugins {
    password_validators: Vec<Arc<dyn PasswordValidator>>,
    policy_checkers: Vec<Arc<dyn PolicyChecker>>,
    enhancers: Vec<Arc<dyn ResponseEnhancer>>,
    guards: Vec<Arc<dyn AuthGuard>>,
    vendor_parsers: HashMap<String, Arc<dyn VendorParser>>,
    vendor_builders: HashMap<String, Arc<dyn VendorResponseBuilder>>,
    accounting_handlers: Vec<Arc<dyn AccountingHandler>>,
    eap_handlers: BTreeMap<u8, Arc<dyn EapHandler>>,
}

/// Registration takes the write lock; every lookup clones `Arc`s out so
/// callers never hold the lock across an await.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<Plugins>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Plugins> {
        self.plugins.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Plugins> {
        self.plugins.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Registry populated with every built-in plugin
    pub fn with_defaults(deps: RegistryDeps) -> Self {
        let registry = Self::new();

        registry.register_password_validator(Arc::new(PapValidator));
        registry.register_password_validator(Arc::new(ChapValidator));
        registry.register_password_validator(Arc::new(MsChapV2Validator));

        registry.register_policy_checker(Arc::new(StatusChecker));
        registry.register_policy_checker(Arc::new(ExpireChecker));
        registry.register_policy_checker(Arc::new(MacBindChecker));
        registry.register_policy_checker(Arc::new(VlanBindChecker));
        registry.register_policy_checker(Arc::new(OnlineCountChecker::new(Arc::clone(
            &deps.sessions,
        ))));

        registry.register_vendor_parser(Arc::new(DefaultParser));
        registry.register_vendor_parser(Arc::new(HuaweiParser));
        registry.register_vendor_parser(Arc::new(H3cParser));
        registry.register_vendor_parser(Arc::new(ZteParser));

        registry.register_enhancer(Arc::new(DefaultEnhancer::new(Arc::clone(&deps.config))));
        registry.register_vendor_builder(Arc::new(DefaultResponseBuilder));
        let vendor_builders: [(&'static str, Arc<dyn VendorResponseBuilder>); 5] = [
            ("huawei", Arc::new(HuaweiResponseBuilder)),
            ("h3c", Arc::new(H3cResponseBuilder)),
            ("zte", Arc::new(ZteResponseBuilder)),
            ("mikrotik", Arc::new(MikrotikResponseBuilder)),
            ("ikuai", Arc::new(IkuaiResponseBuilder)),
        ];
        for (name, builder) in vendor_builders {
            registry.register_vendor_builder(Arc::clone(&builder));
            registry.register_enhancer(Arc::new(VendorRateEnhancer::new(name, builder)));
        }

        let settings = &deps.settings;
        registry.register_guard(Arc::new(RejectDelayGuard::new(
            settings.reject_delay_threshold,
            Duration::from_secs(settings.reject_delay_window_secs),
            settings.reject_delay_max_entries,
        )));

        registry.register_accounting_handler(Arc::new(StartHandler::new(
            Arc::clone(&deps.sessions),
            Arc::clone(&deps.accounting),
        )));
        registry.register_accounting_handler(Arc::new(InterimUpdateHandler::new(
            Arc::clone(&deps.sessions),
            Arc::clone(&deps.accounting),
        )));
        registry.register_accounting_handler(Arc::new(StopHandler::new(
            Arc::clone(&deps.sessions),
            Arc::clone(&deps.accounting),
        )));
        registry.register_accounting_handler(Arc::new(NasStateHandler::new(Arc::clone(
            &deps.sessions,
        ))));

        registry.register_eap_handler(Arc::new(EapMd5Handler));
        registry.register_eap_handler(Arc::new(EapMsChapV2Handler));

        registry
    }

    /// Replaces a validator of the same name in place, keeping its position
    pub fn register_password_validator(&self, validator: Arc<dyn PasswordValidator>) {
        let mut plugins = self.write();
        let list = &mut plugins.password_validators;
        match list.iter().position(|v| v.name() == validator.name()) {
            Some(i) => list[i] = validator,
            None => list.push(validator),
        }
    }

    pub fn password_validators(&self) -> Vec<Arc<dyn PasswordValidator>> {
        self.read().password_validators.clone()
    }

    pub fn password_validator(&self, name: &str) -> Option<Arc<dyn PasswordValidator>> {
        self.read()
            .password_validators
            .iter()
            .find(|v| v.name() == name)
            .cloned()
    }

    pub fn register_policy_checker(&self, checker: Arc<dyn PolicyChecker>) {
        let mut plugins = self.write();
        plugins.policy_checkers.push(checker);
        // stable: equal orders keep registration order
        plugins.policy_checkers.sort_by_key(|c| c.order());
    }

    pub fn policy_checkers(&self) -> Vec<Arc<dyn PolicyChecker>> {
        self.read().policy_checkers.clone()
    }

    pub fn register_enhancer(&self, enhancer: Arc<dyn ResponseEnhancer>) {
        self.write().enhancers.push(enhancer);
    }

    pub fn enhancers(&self) -> Vec<Arc<dyn ResponseEnhancer>> {
        self.read().enhancers.clone()
    }

    pub fn register_guard(&self, guard: Arc<dyn AuthGuard>) {
        self.write().guards.push(guard);
    }

    pub fn guards(&self) -> Vec<Arc<dyn AuthGuard>> {
        self.read().guards.clone()
    }

    pub fn register_vendor_parser(&self, parser: Arc<dyn VendorParser>) {
        let code = parser.vendor_code().to_string();
        self.write().vendor_parsers.insert(code, parser);
    }

    /// Parser for `vendor_code`, else the `default` one
    pub fn vendor_parser(&self, vendor_code: &str) -> Option<Arc<dyn VendorParser>> {
        let plugins = self.read();
        plugins
            .vendor_parsers
            .get(vendor_code)
            .or_else(|| plugins.vendor_parsers.get(DEFAULT_VENDOR))
            .cloned()
    }

    pub fn register_vendor_builder(&self, builder: Arc<dyn VendorResponseBuilder>) {
        let code = builder.vendor_code().to_string();
        self.write().vendor_builders.insert(code, builder);
    }

    /// Builder for `vendor_code`, else the `default` one
    pub fn vendor_builder(&self, vendor_code: &str) -> Option<Arc<dyn VendorResponseBuilder>> {
        let plugins = self.read();
        plugins
            .vendor_builders
            .get(vendor_code)
            .or_else(|| plugins.vendor_builders.get(DEFAULT_VENDOR))
            .cloned()
    }

    pub fn register_accounting_handler(&self, handler: Arc<dyn AccountingHandler>) {
        self.write().accounting_handlers.push(handler);
    }

    pub fn accounting_handlers(&self) -> Vec<Arc<dyn AccountingHandler>> {
        self.read().accounting_handlers.clone()
    }

    /// First registered handler accepting `status`
    pub fn accounting_handler_for(
        &self,
        status: AcctStatusType,
    ) -> Result<Arc<dyn AccountingHandler>, AccountingError> {
        self.read()
            .accounting_handlers
            .iter()
            .find(|h| h.can_handle(status))
            .cloned()
            .ok_or(AccountingError::NoHandler(status))
    }

    pub fn register_eap_handler(&self, handler: Arc<dyn EapHandler>) {
        debug!(method = handler.name(), eap_type = handler.eap_type(), "registered EAP handler");
        self.write().eap_handlers.insert(handler.eap_type(), handler);
    }

    pub fn eap_handler(&self, eap_type: u8) -> Option<Arc<dyn EapHandler>> {
        self.read().eap_handlers.get(&eap_type).cloned()
    }

    pub fn eap_handler_by_name(&self, name: &str) -> Option<Arc<dyn EapHandler>> {
        self.read()
            .eap_handlers
            .values()
            .find(|h| h.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Ordered by EAP type
    pub fn eap_handlers(&self) -> Vec<Arc<dyn EapHandler>> {
        self.read().eap_handlers.values().cloned().collect()
    }
}
