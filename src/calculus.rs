//! Finite difference approximation of operator Jacobians.

use eyre::Result;
use nalgebra::{DMatrixViewMut, DVector, DVectorView, DVectorViewMut};
use numeric_literals::replace_float_literals;

use crate::Real;

/// Approximates the Jacobian of the function $f: \mathbb{R}^n \rightarrow \mathbb{R}^m$
/// with central finite differences of resolution `h` and stores it in `jacobian`.
///
/// The function is called as `f(output, x)`. The vector `x` is mutable in order to hold
/// the perturbed arguments, but upon returning its content remains unchanged.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn approximate_jacobian_fd_into<T>(
    mut jacobian: DMatrixViewMut<T>,
    mut f: impl FnMut(DVectorViewMut<T>, DVectorView<T>) -> Result<()>,
    x: &mut DVector<T>,
    h: T,
) -> Result<()>
where
    T: Real,
{
    let m = jacobian.nrows();
    let n = x.len();
    assert_eq!(n, jacobian.ncols());

    // Buffers to hold f(x + h e_i) and f(x - h e_i)
    let mut f_plus = DVector::zeros(m);
    let mut f_minus = DVector::zeros(m);

    // Build the Jacobian column by column
    for i in 0..n {
        // df/dx_i ~ (f(x + h e_i) - f(x - h e_i)) / (2 h)
        let xi = x[i];
        x[i] = xi + h;
        f(DVectorViewMut::from(&mut f_plus), DVectorView::from(&*x))?;
        x[i] = xi - h;
        f(DVectorViewMut::from(&mut f_minus), DVectorView::from(&*x))?;
        x[i] = xi;

        let mut df_dxi = jacobian.column_mut(i);
        df_dxi.copy_from(&f_plus);
        df_dxi -= &f_minus;
        df_dxi /= 2.0 * h;
    }
    Ok(())
}

/// A reasonable default central-difference resolution for the given scalar type.
pub fn default_finite_difference_resolution<T: Real>() -> T {
    T::default_epsilon().cbrt()
}
