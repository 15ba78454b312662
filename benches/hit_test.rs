use criterion::{criterion_group, criterion_main, Criterion};
use meridian::{
    config::ShellConfig,
    shell::Shell,
    utils::{ClientId, Logical, Point, Rectangle},
};
use rand::Rng;

fn crowded_desktop(windows: usize) -> Shell {
    let mut shell = Shell::new(ShellConfig::default());
    shell.add_output("DP-1", Rectangle::from_loc_and_size((0, 0), (1920, 1080)));
    shell.add_output("DP-2", Rectangle::from_loc_and_size((1920, 0), (2560, 1440)));

    let mut rand = rand::thread_rng();
    for _ in 0..windows {
        let surface = shell.create_surface(ClientId(rand.gen_range(1..16)));
        let Ok(window) = shell.get_shell_surface(surface) else {
            continue;
        };
        shell.set_toplevel(window);
        let size = (rand.gen_range(100..800), rand.gen_range(100..600));
        let (dx, dy) = (rand.gen_range(-400..400), rand.gen_range(-300..300));
        shell.committed(window, size.into(), 0, 0);
        shell.committed(window, size.into(), dx, dy);
    }
    shell.drain_events().for_each(drop);
    shell
}

fn criterion_benchmark(c: &mut Criterion) {
    let shell = crowded_desktop(256);
    let mut rand = rand::thread_rng();
    let points = (0..1024)
        .map(|_| Point::<f64, Logical>::from((rand.gen_range(0.0..4480.0), rand.gen_range(0.0..1440.0))))
        .collect::<Vec<_>>();

    c.bench_function("view_under", |b| {
        b.iter(|| {
            for point in &points {
                criterion::black_box(shell.scene().view_under(*point));
            }
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
