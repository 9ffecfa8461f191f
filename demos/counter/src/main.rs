use std::rc::Rc;

use relay_core::*;
use relay_devtools::Inspector;

#[derive(Clone)]
struct Button {
    label: String,
    on_click: Rc<dyn Fn()>,
}

fn increment(s: &State) -> Patch {
    patch!({ "count": s.get_as::<i64>("count").unwrap_or(0) + 1 })
}

fn counter(title: &'static str) -> impl Fn(&Snapshot, &Updater) -> Button {
    move |s, update| {
        let update = update.clone();
        Button {
            label: format!("{title}: {}", s.get_as::<i64>("count").unwrap_or(0)),
            on_click: Rc::new(move || {
                update.update(increment);
            }),
        }
    }
}

fn print(binding: &Binding<Snapshot, Button>) {
    if let Some(button) = binding.output() {
        println!("  [{}]", button.label);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let initial = State::try_from(json!({ "count": 0, "clicks": [] }))?;
    let provider = Provider::root(initial);
    let mut inspector = Inspector::attach(provider.channel());
    inspector.toggle();

    let scope = Scope::new();
    let shared_a = Binding::builder().render(counter("shared A")).build();
    let shared_b = Binding::builder().render(counter("shared B")).build();
    let local = Binding::builder()
        .local_state(state!({ "count": 10 }))
        .render(counter("local"))
        .build();
    scope.run(|| {
        shared_a.attach(provider.context());
        shared_b.attach(provider.context());
        local.attach(provider.context());
    });

    for round in 1..=3 {
        println!("round {round}");
        if let Some(button) = shared_a.output() {
            (button.on_click)();
        }
        if let Some(button) = local.output() {
            (button.on_click)();
        }
        print(&shared_a);
        print(&shared_b);
        print(&local);
    }

    if let Some(hud) = inspector.overlay() {
        println!("{hud}");
    }

    scope.dispose();
    log::info!(
        "unmounted; {} subscriber(s) left",
        provider.channel().subscriber_count()
    );
    Ok(())
}
