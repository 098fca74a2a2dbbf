//! Hyperparameter records, one per update rule
//!
//! Each record is immutable for the duration of one update call. The
//! learning rate is the only required value; every other coefficient
//! defaults to the conventional setting. All fields are f32 and get cast
//! into the tensor element type at kernel entry (mixed-precision rules
//! evaluate them at f32 directly).
//!
//! Clipping bounds use a negative sentinel: `clip_gradient < 0` (or
//! `clip_weights < 0`) disables the clip, while any non-negative value,
//! zero included, enables it.

/// Hyperparameters for SGD and mixed-precision SGD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SgdParams {
    /// Learning rate
    pub lr: f32,
    /// Weight decay; scales a multiplicative shrink of the weight
    pub wd: f32,
    /// Gradient rescale: effective gradient starts as `rescale_grad * grad`
    pub rescale_grad: f32,
    /// Clip bound for the rescaled gradient; negative disables
    pub clip_gradient: f32,
}

impl SgdParams {
    /// Create a record with the given learning rate and default
    /// coefficients.
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            wd: 0.0,
            rescale_grad: 1.0,
            clip_gradient: -1.0,
        }
    }

    /// Set the weight decay coefficient
    pub fn with_wd(mut self, wd: f32) -> Self {
        self.wd = wd;
        self
    }

    /// Set the gradient rescale factor
    pub fn with_rescale_grad(mut self, rescale_grad: f32) -> Self {
        self.rescale_grad = rescale_grad;
        self
    }

    /// Set the gradient clip bound (negative disables)
    pub fn with_clip_gradient(mut self, clip_gradient: f32) -> Self {
        self.clip_gradient = clip_gradient;
        self
    }
}

/// Hyperparameters for SGD with momentum and its mixed-precision variant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SgdMomParams {
    /// Learning rate
    pub lr: f32,
    /// Decay rate of the momentum accumulator
    pub momentum: f32,
    /// Weight decay, folded into the momentum update
    pub wd: f32,
    /// Gradient rescale factor
    pub rescale_grad: f32,
    /// Clip bound for the rescaled gradient; negative disables
    pub clip_gradient: f32,
}

impl SgdMomParams {
    /// Create a record with the given learning rate and default
    /// coefficients.
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            momentum: 0.0,
            wd: 0.0,
            rescale_grad: 1.0,
            clip_gradient: -1.0,
        }
    }

    /// Set the momentum coefficient
    pub fn with_momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }

    /// Set the weight decay coefficient
    pub fn with_wd(mut self, wd: f32) -> Self {
        self.wd = wd;
        self
    }

    /// Set the gradient rescale factor
    pub fn with_rescale_grad(mut self, rescale_grad: f32) -> Self {
        self.rescale_grad = rescale_grad;
        self
    }

    /// Set the gradient clip bound (negative disables)
    pub fn with_clip_gradient(mut self, clip_gradient: f32) -> Self {
        self.clip_gradient = clip_gradient;
        self
    }
}

/// Hyperparameters for Adam
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamParams {
    /// Learning rate
    pub lr: f32,
    /// Decay rate for the first moment estimate
    pub beta1: f32,
    /// Decay rate for the second moment estimate
    pub beta2: f32,
    /// Small constant for numerical stability, added outside the square
    /// root
    pub epsilon: f32,
    /// Weight decay, added into the gradient (L2 form)
    pub wd: f32,
    /// Gradient rescale factor
    pub rescale_grad: f32,
    /// Clip bound for the rescaled gradient; negative disables
    pub clip_gradient: f32,
}

impl AdamParams {
    /// Create a record with the given learning rate and default
    /// coefficients.
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            wd: 0.0,
            rescale_grad: 1.0,
            clip_gradient: -1.0,
        }
    }

    /// Set the first-moment decay rate
    pub fn with_beta1(mut self, beta1: f32) -> Self {
        self.beta1 = beta1;
        self
    }

    /// Set the second-moment decay rate
    pub fn with_beta2(mut self, beta2: f32) -> Self {
        self.beta2 = beta2;
        self
    }

    /// Set the stability constant
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the weight decay coefficient
    pub fn with_wd(mut self, wd: f32) -> Self {
        self.wd = wd;
        self
    }

    /// Set the gradient rescale factor
    pub fn with_rescale_grad(mut self, rescale_grad: f32) -> Self {
        self.rescale_grad = rescale_grad;
        self
    }

    /// Set the gradient clip bound (negative disables)
    pub fn with_clip_gradient(mut self, clip_gradient: f32) -> Self {
        self.clip_gradient = clip_gradient;
        self
    }
}

/// Hyperparameters for RMSProp (Tieleman & Hinton, 2012)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmsPropParams {
    /// Learning rate
    pub lr: f32,
    /// Decay rate of the running squared-gradient statistic
    pub gamma1: f32,
    /// Small constant for numerical stability, added inside the square
    /// root
    pub epsilon: f32,
    /// Weight decay, added into the gradient (L2 form)
    pub wd: f32,
    /// Gradient rescale factor
    pub rescale_grad: f32,
    /// Clip bound for the rescaled gradient; negative disables
    pub clip_gradient: f32,
    /// Clamp bound applied to the updated weight; negative disables
    pub clip_weights: f32,
}

impl RmsPropParams {
    /// Create a record with the given learning rate and default
    /// coefficients.
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            gamma1: 0.95,
            epsilon: 1e-8,
            wd: 0.0,
            rescale_grad: 1.0,
            clip_gradient: -1.0,
            clip_weights: -1.0,
        }
    }

    /// Set the statistic decay rate
    pub fn with_gamma1(mut self, gamma1: f32) -> Self {
        self.gamma1 = gamma1;
        self
    }

    /// Set the stability constant
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the weight decay coefficient
    pub fn with_wd(mut self, wd: f32) -> Self {
        self.wd = wd;
        self
    }

    /// Set the gradient rescale factor
    pub fn with_rescale_grad(mut self, rescale_grad: f32) -> Self {
        self.rescale_grad = rescale_grad;
        self
    }

    /// Set the gradient clip bound (negative disables)
    pub fn with_clip_gradient(mut self, clip_gradient: f32) -> Self {
        self.clip_gradient = clip_gradient;
        self
    }

    /// Set the weight clamp bound (negative disables)
    pub fn with_clip_weights(mut self, clip_weights: f32) -> Self {
        self.clip_weights = clip_weights;
        self
    }
}

/// Hyperparameters for RMSPropAlex (Graves, 2013)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmsPropAlexParams {
    /// Learning rate
    pub lr: f32,
    /// Decay rate of the running first/second gradient statistics
    pub gamma1: f32,
    /// Decay rate of the delta accumulator
    pub gamma2: f32,
    /// Small constant for numerical stability, added inside the square
    /// root
    pub epsilon: f32,
    /// Weight decay, added into the gradient (L2 form)
    pub wd: f32,
    /// Gradient rescale factor
    pub rescale_grad: f32,
    /// Clip bound for the rescaled gradient; negative disables
    pub clip_gradient: f32,
    /// Clamp bound applied to the updated weight; negative disables
    pub clip_weights: f32,
}

impl RmsPropAlexParams {
    /// Create a record with the given learning rate and default
    /// coefficients.
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            gamma1: 0.95,
            gamma2: 0.9,
            epsilon: 1e-8,
            wd: 0.0,
            rescale_grad: 1.0,
            clip_gradient: -1.0,
            clip_weights: -1.0,
        }
    }

    /// Set the statistic decay rate
    pub fn with_gamma1(mut self, gamma1: f32) -> Self {
        self.gamma1 = gamma1;
        self
    }

    /// Set the delta decay rate
    pub fn with_gamma2(mut self, gamma2: f32) -> Self {
        self.gamma2 = gamma2;
        self
    }

    /// Set the stability constant
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the weight decay coefficient
    pub fn with_wd(mut self, wd: f32) -> Self {
        self.wd = wd;
        self
    }

    /// Set the gradient rescale factor
    pub fn with_rescale_grad(mut self, rescale_grad: f32) -> Self {
        self.rescale_grad = rescale_grad;
        self
    }

    /// Set the gradient clip bound (negative disables)
    pub fn with_clip_gradient(mut self, clip_gradient: f32) -> Self {
        self.clip_gradient = clip_gradient;
        self
    }

    /// Set the weight clamp bound (negative disables)
    pub fn with_clip_weights(mut self, clip_weights: f32) -> Self {
        self.clip_weights = clip_weights;
        self
    }
}
