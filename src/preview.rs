//! Live preview of the forward model.
//!
//! A [`PreviewSession`] holds the parameter set of one spectrum. Every
//! accepted parameter change recomputes the modeled spectrum and dispatches
//! a [`PreviewUpdate`] to all subscribed listeners. A full fit can run on a
//! rayon worker through [`PreviewSession::start_fit`] while the session keeps
//! answering forward calculations.
//!
//! ```
//! use ndarray::Array1;
//! use std::sync::{Arc, Mutex};
//! use xrffit_rs::config::XrfConfig;
//! use xrffit_rs::fit::FitSolver;
//! use xrffit_rs::lines::LineTable;
//! use xrffit_rs::preview::PreviewSession;
//! use xrffit_rs::spectrum::{Calibration, Spectrum};
//!
//! let solver = FitSolver::new(XrfConfig::new()).unwrap();
//! let cal = Calibration::linear(0.0, 0.01).unwrap();
//! let spectrum = Spectrum::new(Array1::from_elem(800, 3.0), cal).unwrap();
//! let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();
//! let mut session = PreviewSession::new(solver, &spectrum, groups).unwrap();
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! session.subscribe(move |update| sink.lock().unwrap().push(update.changed.clone()));
//!
//! session.set_value("Fe_K_area", 250.0).unwrap();
//! assert_eq!(seen.lock().unwrap()[0], vec!["Fe_K_area".to_string()]);
//! ```

use ndarray::Array1;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, XrfError};
use crate::fit::{FitResult, FitSolver};
use crate::lines::LineGroup;
use crate::model::SpectrumModel;
use crate::parameters::FitParameters;
use crate::spectrum::Spectrum;

/// Sent to listeners after every change of the parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewUpdate {
    /// Names of the parameters whose value changed.
    pub changed: Vec<String>,
    /// Modeled counts at the new parameters.
    pub model: Array1<f64>,
}

type Listener = Box<dyn Fn(&PreviewUpdate) + Send + Sync>;

/// Identifies a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// Handle to a fit running in the background.
#[derive(Debug)]
pub struct FitHandle {
    receiver: Receiver<Result<FitResult>>,
}

impl FitHandle {
    /// The result if the fit has finished; never blocks. Returns `Some`
    /// only once.
    pub fn try_result(&self) -> Option<Result<FitResult>> {
        self.receiver.try_recv().ok()
    }

    /// Block until the fit finishes.
    pub fn wait(self) -> Result<FitResult> {
        self.receiver.recv().map_err(|_| {
            XrfError::FunctionEvaluation("background fit stopped without a result".to_string())
        })?
    }
}

/// Interactive parameter editing with forward-model updates.
pub struct PreviewSession {
    solver: Arc<FitSolver>,
    model: Arc<SpectrumModel>,
    params: FitParameters,
    listeners: Vec<(ListenerId, Listener)>,
    next_id: usize,
}

impl PreviewSession {
    /// Session over `spectrum` starting from the default parameters.
    pub fn new(solver: FitSolver, spectrum: &Spectrum, groups: Vec<LineGroup>) -> Result<Self> {
        let model = solver.model(spectrum, &groups)?;
        let params = model.default_parameters()?;
        Ok(Self {
            solver: Arc::new(solver),
            model: Arc::new(model),
            params,
            listeners: Vec::new(),
            next_id: 0,
        })
    }

    pub fn parameters(&self) -> &FitParameters {
        &self.params
    }

    /// Replace the whole parameter set, e.g. one loaded from JSON. The model
    /// must be able to evaluate it.
    pub fn set_parameters(&mut self, params: FitParameters) -> Result<Array1<f64>> {
        let model = self.model.evaluate(&params)?;
        let changed = params.names().iter().map(|n| n.to_string()).collect();
        self.params = params;
        self.dispatch(changed, model.clone());
        Ok(model)
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&PreviewUpdate) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(other, _)| *other != id);
        self.listeners.len() != before
    }

    /// Forward model at the current parameters.
    pub fn model(&self) -> Result<Array1<f64>> {
        self.model.evaluate(&self.params)
    }

    fn dispatch(&self, changed: Vec<String>, model: Array1<f64>) {
        let update = PreviewUpdate { changed, model };
        debug!(listeners = self.listeners.len(), changed = ?update.changed, "preview update");
        for (_, listener) in &self.listeners {
            listener(&update);
        }
    }

    /// Change one value. Out-of-bounds values and unknown names are rejected
    /// and leave the session unchanged.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<Array1<f64>> {
        let mut params = self.params.clone();
        params.set_value(name, value)?;
        let model = self.model.evaluate(&params)?;
        self.params = params;
        self.dispatch(vec![name.to_string()], model.clone());
        Ok(model)
    }

    /// Mark a parameter free or fixed for the next fit. The model does not
    /// change, so no update is dispatched.
    pub fn set_vary(&mut self, name: &str, vary: bool) -> Result<()> {
        self.params.set_vary(name, vary)?;
        Ok(())
    }

    /// Fit the current parameters on a rayon worker.
    pub fn start_fit(&self) -> FitHandle {
        let (sender, receiver) = mpsc::channel();
        let solver = Arc::clone(&self.solver);
        let model = Arc::clone(&self.model);
        let params = self.params.clone();
        rayon::spawn(move || {
            let result = solver.fit_model(&model, &params);
            // The handle may have been dropped.
            let _ = sender.send(result);
        });
        FitHandle { receiver }
    }

    /// Take over the values of a fit result and notify listeners.
    pub fn apply(&mut self, result: &FitResult) -> Result<Array1<f64>> {
        let mut params = self.params.clone();
        params.update_values_from(&result.params);
        self.commit(params)
    }

    /// Return every parameter to its initial value.
    pub fn reset(&mut self) -> Result<Array1<f64>> {
        let mut params = self.params.clone();
        params.reset();
        self.commit(params)
    }

    /// Evaluate `params`, adopt them and dispatch the names whose value moved.
    fn commit(&mut self, params: FitParameters) -> Result<Array1<f64>> {
        let changed: Vec<String> = params
            .iter()
            .filter(|p| {
                self.params
                    .get(p.name())
                    .map_or(true, |old| old.value() != p.value())
            })
            .map(|p| p.name().to_string())
            .collect();
        let model = self.model.evaluate(&params)?;
        self.params = params;
        self.dispatch(changed, model.clone());
        Ok(model)
    }
}
