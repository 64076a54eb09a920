use crate::graphics::Rgb;

/// A point or direction in world space (centimetres, y up)
pub type Vec3 = [f64; 3];

/// Component-wise sum of two vectors
pub fn add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Component-wise difference `a - b`
pub fn sub(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Scales a vector by a scalar
pub fn scale(v: &Vec3, s: f64) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// Euclidean length of a vector
pub fn length(v: &Vec3) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Returns the unit vector in the direction of `v`, or `v` itself if it has no length
pub fn normalize(v: &Vec3) -> Vec3 {
    let len = length(v);
    if len <= f64::EPSILON {
        *v
    } else {
        scale(v, 1.0 / len)
    }
}

/// Linear interpolation between two scalars
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Linear interpolation between two points
pub fn lerp_point(a: &Vec3, b: &Vec3, t: f64) -> Vec3 {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
}

/// Rotation matrix about the X axis
pub fn rotation_x(angle: f64) -> [[f64; 3]; 3] {
    let (sin, cos) = angle.sin_cos();
    [[1.0, 0.0, 0.0], [0.0, cos, -sin], [0.0, sin, cos]]
}

/// Rotation matrix about the Y (vertical) axis
pub fn rotation_y(angle: f64) -> [[f64; 3]; 3] {
    let (sin, cos) = angle.sin_cos();
    [[cos, 0.0, sin], [0.0, 1.0, 0.0], [-sin, 0.0, cos]]
}

/// Edge function used in rasterization
pub fn edge_function(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> f64 {
    (c[0] - a[0]) * (b[1] - a[1]) - (c[1] - a[1]) * (b[0] - a[0])
}

/// Multiplies a 3x3 matrix by a 3-dimensional vector
pub fn multiply_matrix_vector(matrix: &[[f64; 3]; 3], vector: &Vec3) -> Vec3 {
    let mut result = [0.0; 3];
    for i in 0..3 {
        for j in 0..3 {
            result[i] += matrix[i][j] * vector[j];
        }
    }
    result
}

/// Multiplies two 3x3 matrices
pub fn multiply_matrices(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut result = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                result[i][j] += a[i][k] * b[k][j];
            }
        }
    }
    result
}

/// Calculates the normal vector of a triangle
pub fn calculate_normal(a: &Vec3, b: &Vec3, c: &Vec3) -> Vec3 {
    let u = sub(b, a);
    let v = sub(c, a);
    normalize(&[
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ])
}

/// Calculates the light intensity for a face normal lit from a fixed direction
pub fn calculate_light_intensity(normal: &Vec3, light_dir: &Vec3) -> f64 {
    let light_dir = normalize(light_dir);
    let dot_product =
        normal[0] * light_dir[0] + normal[1] * light_dir[1] + normal[2] * light_dir[2];
    // Faces are two-sided, so back faces are lit as well
    dot_product.abs().max(0.25)
}

/// Applies lighting to a color
pub fn apply_lighting(color: Rgb, intensity: f64) -> Rgb {
    let r = (color.0 as f64 * intensity).min(255.0) as u8;
    let g = (color.1 as f64 * intensity).min(255.0) as u8;
    let b = (color.2 as f64 * intensity).min(255.0) as u8;
    Rgb(r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rotation_y_quarter_turn() {
        let rotated = multiply_matrix_vector(&rotation_y(std::f64::consts::FRAC_PI_2), &[1.0, 0.0, 0.0]);
        assert_abs_diff_eq!(rotated[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rotated[2], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_matrix_product_matches_sequential_application() {
        let combined = multiply_matrices(&rotation_x(0.4), &rotation_y(1.1));
        let v = [3.0, -2.0, 5.0];
        let sequential = multiply_matrix_vector(&rotation_x(0.4), &multiply_matrix_vector(&rotation_y(1.1), &v));
        let direct = multiply_matrix_vector(&combined, &v);
        for i in 0..3 {
            assert_abs_diff_eq!(sequential[i], direct[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_normal_of_xy_triangle_points_along_z() {
        let n = calculate_normal(&[0.0, 0.0, 0.0], &[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert_abs_diff_eq!(n[2].abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lighting_keeps_ambient_floor() {
        let lit = apply_lighting(Rgb(200, 100, 40), calculate_light_intensity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]));
        assert_eq!(lit, Rgb(50, 25, 10));
    }
}
