use nalgebra::{Point3, Vector3};

const DEGENERATE_NORM_SQ: f64 = 1e-24;

/// The signed dihedral angle p1-p2-p3-p4 in radians, in (-π, π], together with its
/// gradient with respect to each of the four points.
///
/// Collinear arms make the angle undefined; the gradient is then reported as zero.
pub fn dihedral_with_gradient(
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
    p4: &Point3<f64>,
) -> (f64, [Vector3<f64>; 4]) {
    let b1 = p2 - p1;
    let b2 = p3 - p2;
    let b3 = p4 - p3;

    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    let b2_norm = b2.norm();

    let y = b2_norm * b1.dot(&n2);
    let x = n1.dot(&n2);
    let angle = y.atan2(x);

    let n1_sq = n1.norm_squared();
    let n2_sq = n2.norm_squared();
    if n1_sq < DEGENERATE_NORM_SQ || n2_sq < DEGENERATE_NORM_SQ || b2_norm == 0.0 {
        return (angle, [Vector3::zeros(); 4]);
    }

    let d1 = n1 * (-b2_norm / n1_sq);
    let d4 = n2 * (b2_norm / n2_sq);
    let f = b1.dot(&b2) / (b2_norm * b2_norm);
    let h = b3.dot(&b2) / (b2_norm * b2_norm);
    let d2 = -d1 - d1 * f + d4 * h;
    let d3 = -d4 + d1 * f - d4 * h;

    (angle, [d1, d2, d3, d4])
}

#[inline]
pub fn dihedral(p1: &Point3<f64>, p2: &Point3<f64>, p3: &Point3<f64>, p4: &Point3<f64>) -> f64 {
    dihedral_with_gradient(p1, p2, p3, p4).0
}

/// The normalized triple product that measures side-chain chirality at a residue,
/// with its gradient with respect to the four defining points.
///
/// With `a = C′ − Cα`, `b = Cα − N` and `c = Cα − Cβ`, the value is
/// `(a × b) · c / (|a| |b| |c|)`. Gradients are returned in the order
/// `[C′, Cα, N, Cβ]`.
pub fn chirality_with_gradient(
    c_prime: &Point3<f64>,
    alpha: &Point3<f64>,
    nitrogen: &Point3<f64>,
    beta: &Point3<f64>,
) -> (f64, [Vector3<f64>; 4]) {
    let a = c_prime - alpha;
    let b = alpha - nitrogen;
    let c = alpha - beta;

    let a_sq = a.norm_squared();
    let b_sq = b.norm_squared();
    let c_sq = c.norm_squared();
    let norm = (1.0 / (a_sq * b_sq * c_sq)).sqrt();

    let chi = a.cross(&b).dot(&c) * norm;

    let grad_a = b.cross(&c) * norm - a * (chi / a_sq);
    let grad_b = c.cross(&a) * norm - b * (chi / b_sq);
    let grad_c = a.cross(&b) * norm - c * (chi / c_sq);

    let grad_c_prime = grad_a;
    let grad_alpha = -grad_a + grad_b + grad_c;
    let grad_nitrogen = -grad_b;
    let grad_beta = -grad_c;

    (chi, [grad_c_prime, grad_alpha, grad_nitrogen, grad_beta])
}
