use clam_engine::device::check_kernel;
use clam_engine::kernel::extract_options;

const MANDELBROT: &str = include_str!("../kernels/mandelbrot.wgsl");

#[test]
fn mandelbrot_declares_its_options() {
    let options = extract_options(&[MANDELBROT]);
    let keys: Vec<_> = options.iter().map(|o| (o.key.as_str(), o.default.as_str())).collect();
    assert_eq!(keys, vec![("ITERS", "256u"), ("BAILOUT", "256.0")]);
}

#[test]
fn mandelbrot_builds_with_defaults_and_overrides() {
    let sources = vec![MANDELBROT.to_string()];
    assert_eq!(check_kernel(&sources, ""), Ok(String::new()));
    assert_eq!(check_kernel(&sources, "-D ITERS=64u -D BAILOUT=4.0"), Ok(String::new()));
}

#[test]
fn mandelbrot_rejects_ill_typed_override() {
    let sources = vec![MANDELBROT.to_string()];
    assert!(check_kernel(&sources, "-D ITERS=1.5").is_err());
}
