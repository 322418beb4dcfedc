use rosl::metrics::{count_nonzero, mean_squared_error, relative_error};
use rosl::{decompose, Matrix, Method, RoslConfig, RoslError};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    println!("=== Robust Orthonormal Subspace Learning ===\n");

    // Rank-two data with a handful of gross corruptions
    let (n_samples, n_features) = (60, 40);
    let clean = synthetic_low_rank(n_samples, n_features);
    let outliers: Vec<(usize, usize, f64)> = (0..30)
        .map(|t| {
            let sign = if t % 2 == 0 { 1.0 } else { -1.0 };
            ((13 * t + 7) % n_samples, (17 * t + 3) % n_features, sign * (5.0 + (t % 4) as f64))
        })
        .collect();

    let mut x = clean.clone();
    for &(i, j, value) in &outliers {
        x[[i, j]] += value;
    }

    println!("Data shape: {} samples, {} features", n_samples, n_features);
    println!("Corrupted entries: {}\n", outliers.len());

    let reg = 1.0 / (n_samples.max(n_features) as f64).sqrt();

    println!(
        "{:<22} {:>6} {:>8} {:>12} {:>12} {:>10}",
        "Method", "Rank", "Iters", "L error", "MSE", "nnz(E)"
    );
    println!("{}", "-".repeat(75));

    let methods = [
        ("ROSL (full)", Method::Full),
        ("ROSL+ (45 x 30)", Method::Subsample { rows: 45, cols: 30 }),
        ("ROSL+ (30 x 20)", Method::Subsample { rows: 30, cols: 20 }),
    ];

    for (name, method) in methods.iter() {
        let config = RoslConfig::new().method(*method).rank(5).reg(reg).random_state(42);
        match run(&x, &clean, &config) {
            Ok(row) => println!("{:<22} {}", name, row),
            Err(e) => println!("{:<22} failed: {}", name, e),
        }
    }

    println!("\n=== Effect of the regularization weight ===");
    println!("{:>10} {:>6} {:>10}", "reg", "Rank", "nnz(E)");
    for &scale in &[0.25, 0.5, 1.0, 2.0, 4.0] {
        let config = RoslConfig::new().rank(5).reg(reg * scale).random_state(42);
        let result = decompose(&x, &config)?;
        println!(
            "{:>10.4} {:>6} {:>10}",
            reg * scale,
            result.rank,
            count_nonzero(&result.error, 1e-6)
        );
    }

    Ok(())
}

fn run(x: &Matrix, clean: &Matrix, config: &RoslConfig) -> Result<String, RoslError> {
    let result = decompose(x, config)?;
    let low_rank = result.low_rank();

    Ok(format!(
        "{:>6} {:>8} {:>12.2e} {:>12.2e} {:>10}",
        result.rank,
        result.iterations,
        relative_error(clean, &low_rank)?,
        mean_squared_error(clean, &low_rank)?,
        count_nonzero(&result.error, 1e-6)
    ))
}

fn synthetic_low_rank(n_samples: usize, n_features: usize) -> Matrix {
    let u = Matrix::from_shape_fn((n_samples, 2), |(i, k)| {
        (0.37 * i as f64 + 1.1 * k as f64).sin()
    });
    let v = Matrix::from_shape_fn((2, n_features), |(k, j)| {
        (0.21 * j as f64 * (k + 1) as f64).cos()
    });
    u.dot(&v)
}
