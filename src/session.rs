// Session and Pool
// Per-depth volatile state over the shared immutable tables, a pool of
// reusable sessions per model, and the process-wide model registry

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::arrivals::{self, Request, TTime};
use crate::auxdata::AuxData;
use crate::depth::{self, VolatileTables};
use crate::errors::{SessionError, SessionResult};
use crate::model::RadialModel;
use crate::tables::RefTables;

/// Deepest supported source, km.
pub const MAX_DEPTH_KM: f64 = 800.0;

/// Session option set; all off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFlags {
    pub return_all_phases: bool,
    pub return_back_branches: bool,
    pub tectonic: bool,
    pub use_rstt: bool,
    pub plot_mode: bool,
}

/// Where the engine finds its inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub model_path: PathBuf,
    pub aux_data_path: PathBuf,
}

/// Process-wide cache: model name to reference tables, built on first use,
/// shared lock-free afterwards through the Arc handles.
pub struct Registry {
    config: EngineConfig,
    tables: RwLock<HashMap<String, Arc<RefTables>>>,
    aux: Mutex<Option<Arc<AuxData>>>,
}

impl Registry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(HashMap::new()),
            aux: Mutex::new(None),
        }
    }

    pub fn aux_data(&self) -> SessionResult<Arc<AuxData>> {
        let mut guard = self.aux.lock().map_err(|_| SessionError::PoolPoisoned)?;
        if let Some(aux) = guard.as_ref() {
            return Ok(aux.clone());
        }
        let aux = Arc::new(AuxData::load(&self.config.aux_data_path)?);
        *guard = Some(aux.clone());
        Ok(aux)
    }

    /// Reference tables for a model, built on first use.
    pub fn tables(&self, model_name: &str) -> SessionResult<Arc<RefTables>> {
        if let Some(t) = self
            .tables
            .read()
            .map_err(|_| SessionError::PoolPoisoned)?
            .get(model_name)
        {
            return Ok(t.clone());
        }
        let path = self.config.model_path.join(format!("{}.mod", model_name));
        if !path.exists() {
            return Err(SessionError::UnknownModel(model_name.to_string()));
        }
        let model = RadialModel::from_file(&path)?;
        let tables = Arc::new(RefTables::build(model)?);
        let mut guard = self
            .tables
            .write()
            .map_err(|_| SessionError::PoolPoisoned)?;
        // Another thread may have won the build race; first in wins.
        let entry = guard
            .entry(model_name.to_string())
            .or_insert_with(|| tables.clone());
        info!("registry: model {} ready", model_name);
        Ok(entry.clone())
    }
}

/// One travel-time session: immutable tables plus exclusively owned volatile
/// per-depth state.
pub struct Session {
    model_name: String,
    tables: Arc<RefTables>,
    aux: Arc<AuxData>,
    vol: VolatileTables,
    flags: SessionFlags,
    phase_list: Vec<String>,
    last_depth: Option<f64>,
    pub acquired_at: DateTime<Utc>,
}

impl Session {
    /// Assemble a session directly from prebuilt tables, bypassing the
    /// registry. The pool uses this internally.
    pub fn from_parts(model_name: String, tables: Arc<RefTables>, aux: Arc<AuxData>) -> Self {
        let vol = depth::correct_to_depth(&tables, 0.0);
        Self {
            model_name,
            tables,
            aux,
            vol,
            flags: SessionFlags::default(),
            phase_list: Vec::new(),
            last_depth: None,
            acquired_at: Utc::now(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn flags(&self) -> SessionFlags {
        self.flags
    }

    /// Reset the volatile state for a new depth and option set. An
    /// out-of-range depth marks the session bad; `get_tt` then returns an
    /// empty list until the next successful reset.
    pub fn new_session(
        &mut self,
        depth_km: f64,
        phase_list: &[String],
        flags: SessionFlags,
    ) -> SessionResult<()> {
        self.flags = flags;
        self.phase_list = phase_list.to_vec();
        if !(0.0..=MAX_DEPTH_KM).contains(&depth_km) || depth_km.is_nan() {
            self.vol = depth::bad_depth_state(&self.tables, depth_km);
            self.last_depth = None;
            return Err(SessionError::DepthOutOfRange {
                depth: depth_km,
                max: MAX_DEPTH_KM,
            });
        }
        // Repeating the last depth is a no-op on the volatile tables.
        if self.last_depth != Some(depth_km) || self.vol.bad_depth {
            self.vol = depth::correct_to_depth(&self.tables, depth_km);
            self.last_depth = Some(depth_km);
        } else {
            debug!("depth {} km memoised", depth_km);
        }
        Ok(())
    }

    /// Arrival list for one receiver; re-entrant against the shared tables,
    /// serial within the session.
    pub fn get_tt(&self, request: &Request) -> Vec<TTime> {
        arrivals::generate(
            &self.tables,
            &self.vol,
            &self.aux,
            &self.flags,
            &self.phase_list,
            request,
        )
    }
}

/// Pool of reusable sessions keyed by model name.
pub struct SessionPool {
    registry: Arc<Registry>,
    free: Mutex<HashMap<String, Vec<Session>>>,
    in_use: AtomicUsize,
}

impl SessionPool {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            free: Mutex::new(HashMap::new()),
            in_use: AtomicUsize::new(0),
        }
    }

    /// A free session for the model, or a fresh one when none is available.
    pub fn acquire(&self, model_name: &str) -> SessionResult<Session> {
        let recycled = self
            .free
            .lock()
            .map_err(|_| SessionError::PoolPoisoned)?
            .get_mut(model_name)
            .and_then(Vec::pop);
        let mut session = match recycled {
            Some(s) => s,
            None => {
                let tables = self.registry.tables(model_name)?;
                let aux = self.registry.aux_data()?;
                Session::from_parts(model_name.to_string(), tables, aux)
            }
        };
        session.acquired_at = Utc::now();
        self.in_use.fetch_add(1, Ordering::Relaxed);
        Ok(session)
    }

    pub fn release(&self, session: Session) -> SessionResult<()> {
        self.in_use.fetch_sub(1, Ordering::Relaxed);
        self.free
            .lock()
            .map_err(|_| SessionError::PoolPoisoned)?
            .entry(session.model_name.clone())
            .or_default()
            .push(session);
        Ok(())
    }

    pub fn free_count(&self, model_name: &str) -> usize {
        self.free
            .lock()
            .map(|g| g.get(model_name).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn in_use_count(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{TOY_ELLIP, TOY_GROUPS, TOY_MODEL, TOY_STATS};

    fn session() -> Session {
        let model = RadialModel::from_str(TOY_MODEL).unwrap();
        let tables = Arc::new(RefTables::build(model).unwrap());
        let aux = Arc::new(AuxData::from_strs(TOY_GROUPS, TOY_STATS, TOY_ELLIP).unwrap());
        Session::from_parts("toy".to_string(), tables, aux)
    }

    fn all_flags() -> SessionFlags {
        SessionFlags {
            return_all_phases: true,
            return_back_branches: true,
            tectonic: false,
            use_rstt: false,
            plot_mode: false,
        }
    }

    #[test]
    fn test_bad_depth_empty_list() {
        let mut s = session();
        assert!(matches!(
            s.new_session(900.0, &[], all_flags()),
            Err(SessionError::DepthOutOfRange { .. })
        ));
        let request = Request {
            delta_deg: Some(30.0),
            ..Default::default()
        };
        assert!(s.get_tt(&request).is_empty());
        // Recovery on a valid depth.
        s.new_session(10.0, &[], all_flags()).unwrap();
        assert!(!s.get_tt(&request).is_empty());
    }

    #[test]
    fn test_arrivals_ordered_and_first_is_sane() {
        let mut s = session();
        s.new_session(10.0, &[], all_flags()).unwrap();
        let request = Request {
            delta_deg: Some(40.0),
            ..Default::default()
        };
        let tts = s.get_tt(&request);
        assert!(!tts.is_empty());
        for w in tts.windows(2) {
            assert!(w[0].tt <= w[1].tt);
        }
        // First arrival at 40 degrees must be a P-type wave.
        assert!(tts[0].phase_code.starts_with('P') || tts[0].phase_code == "Pn");
    }

    #[test]
    fn test_phase_list_restriction() {
        let mut s = session();
        let list = vec!["PKP".to_string(), "SKP".to_string()];
        s.new_session(33.0, &list, all_flags()).unwrap();
        let request = Request {
            delta_deg: Some(10.0),
            ..Default::default()
        };
        for tt in s.get_tt(&request) {
            let code = tt.phase_code.as_str();
            let stripped = code
                .strip_prefix('p')
                .or_else(|| code.strip_prefix('s'))
                .unwrap_or(code);
            assert!(
                stripped.starts_with("PKP") || stripped.starts_with("SKP"),
                "unexpected phase {}",
                code
            );
        }
    }

    #[test]
    fn test_pool_recycles_sessions() {
        let model = RadialModel::from_str(TOY_MODEL).unwrap();
        let tables = Arc::new(RefTables::build(model).unwrap());
        let aux = Arc::new(AuxData::from_strs(TOY_GROUPS, TOY_STATS, TOY_ELLIP).unwrap());
        let registry = Arc::new(Registry::new(EngineConfig {
            model_path: PathBuf::from("."),
            aux_data_path: PathBuf::from("."),
        }));
        // Seed the registry cache directly to avoid filesystem I/O.
        registry
            .tables
            .write()
            .unwrap()
            .insert("toy".to_string(), tables);
        *registry.aux.lock().unwrap() = Some(aux);

        let pool = SessionPool::new(registry);
        let s1 = pool.acquire("toy").unwrap();
        assert_eq!(pool.in_use_count(), 1);
        pool.release(s1).unwrap();
        assert_eq!(pool.in_use_count(), 0);
        assert_eq!(pool.free_count("toy"), 1);
        let _s2 = pool.acquire("toy").unwrap();
        assert_eq!(pool.free_count("toy"), 0);
    }

    #[test]
    fn test_memoised_depth_is_stable() {
        let mut s = session();
        s.new_session(50.0, &[], all_flags()).unwrap();
        let request = Request {
            delta_deg: Some(60.0),
            ..Default::default()
        };
        let first = s.get_tt(&request);
        s.new_session(50.0, &[], all_flags()).unwrap();
        let second = s.get_tt(&request);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.phase_code, b.phase_code);
            assert_eq!(a.tt.to_bits(), b.tt.to_bits());
        }
    }
}
