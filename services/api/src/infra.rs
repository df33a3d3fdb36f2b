use escolar::config::{AcademicConfig, StorageConfig};
use escolar::enrollment::requests::NewCareer;
use escolar::enrollment::{EnrollmentService, MemoryStore, SeedPlan, PROTECTED_USERNAME};
use escolar::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type Service = EnrollmentService<MemoryStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Open the configured store. Without a data file the service starts empty and keeps nothing.
pub(crate) fn open_store(storage: &StorageConfig) -> Result<Arc<MemoryStore>, AppError> {
    let store = match &storage.data_file {
        Some(path) => {
            info!(path = %path.display(), "loading entity snapshot");
            MemoryStore::open(path)?
        }
        None => MemoryStore::new(),
    };
    Ok(Arc::new(store))
}

pub(crate) fn build_service(store: Arc<MemoryStore>, academic: &AcademicConfig) -> Arc<Service> {
    Arc::new(EnrollmentService::new(store, academic.eligibility()))
}

/// Admin login plus the careers every fresh installation offers.
pub(crate) fn default_seed_plan() -> SeedPlan {
    let mut plan = SeedPlan::with_admin(PROTECTED_USERNAME);
    plan.careers = [
        ("ISC", "Ingenieria en Sistemas Computacionales"),
        ("IND", "Ingenieria Industrial"),
        ("ADM", "Licenciatura en Administracion"),
    ]
    .into_iter()
    .map(|(clave, nombre)| NewCareer {
        clave: clave.to_string(),
        nombre: nombre.to_string(),
    })
    .collect();
    plan
}
