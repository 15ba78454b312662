use std::{cell::RefCell, rc::Rc};

use meridian::{
    config::ShellConfig,
    focus::ScopeKind,
    input::pointer::{
        AxisFrame, ButtonEvent, ButtonState, CursorIcon, GrabStartData, MotionEvent, PointerGrab, PointerInnerHandle,
        BTN_LEFT,
    },
    scene::{Affine, LayerKind, ViewId},
    shell::{grabs::InertGrab, PanelEdge, ResizeEdge, ShellError, ShellEvent, SurfaceType},
    surface::SurfaceId,
    utils::{Logical, Point, Rectangle, Serial, Size, Time},
    workspace::MAX_WORKSPACES,
};

mod common;
use common::*;

#[test]
fn maximize_below_top_panel() {
    let mut desktop = Desktop::start();
    desktop.top_panel(30);
    let output = desktop.output;
    assert_eq!(
        desktop.shell.output(output).map(|o| o.available_geometry()),
        Some(Rectangle::from_loc_and_size((0, 30), (1920, 1050)))
    );

    let (surface, window) = desktop.map_window((800, 600));
    desktop.flush();
    desktop.shell.set_maximized(window, None);
    assert_eq!(desktop.configures(surface), vec![Size::from((1920, 1050))]);

    desktop.shell.committed(window, (1920, 1050).into(), 0, 0);
    let sh = desktop.shell.shell_surface(window).unwrap();
    assert!(sh.is_maximized());
    let view = sh.view(output).unwrap();
    assert_eq!(
        desktop.shell.scene().global_position(view),
        Some(Point::<f64, Logical>::from((0.0, 30.0)))
    );

    // back to the previous size and place
    desktop.shell.set_toplevel(window);
    assert_eq!(desktop.configures(surface), vec![Size::from((800, 600))]);
    desktop.shell.committed(window, (800, 600).into(), 0, 0);
    let sh = desktop.shell.shell_surface(window).unwrap();
    assert_eq!(sh.location(), Point::from((560, 255)));
    assert_eq!(sh.surface_type(), SurfaceType::Toplevel {
        maximized: false,
        fullscreen: false,
        output: None,
    });
}

#[test]
fn removing_a_panel_gives_the_space_back() {
    let mut desktop = Desktop::start();
    let panel = desktop.top_panel(30);
    desktop.shell.destroy_surface(panel);
    let output = desktop.output;
    assert_eq!(
        desktop.shell.output(output).map(|o| o.available_geometry()),
        Some(Rectangle::from_loc_and_size((0, 0), (1920, 1080)))
    );
}

#[test]
fn next_workspace_wraps_around() {
    let mut desktop = Desktop::with_config(ShellConfig {
        workspaces: 3,
        animate_workspace_switch: false,
        ..ShellConfig::default()
    });
    let output = desktop.output;
    let last = desktop.shell.workspace(2).unwrap();
    desktop.shell.activate_workspace(last, output, false);
    assert_eq!(desktop.shell.current_workspace(output), Some(last));

    desktop.shell.activate_next_workspace(output);
    let first = desktop.shell.workspace(0).unwrap();
    assert_eq!(desktop.shell.current_workspace(output), Some(first));
    assert!(desktop.flush().contains(&ShellEvent::WorkspaceActivated {
        output,
        workspace: first,
    }));

    desktop.shell.activate_previous_workspace(output);
    assert_eq!(desktop.shell.current_workspace(output), Some(last));
}

#[test]
fn workspace_round_trip_restores_the_pan() {
    let mut desktop = Desktop::start();
    let output = desktop.output;
    let first = desktop.shell.workspace(0).unwrap();
    let before: Vec<_> = desktop.shell.workspaces().iter().map(|w| w.pan(output)).collect();

    let other = desktop.shell.workspace(3).unwrap();
    desktop.shell.activate_workspace(other, output, false);
    assert_ne!(
        desktop.shell.workspaces().iter().map(|w| w.pan(output)).collect::<Vec<_>>(),
        before
    );
    desktop.shell.activate_workspace(first, output, false);
    let after: Vec<_> = desktop.shell.workspaces().iter().map(|w| w.pan(output)).collect();
    assert_eq!(after, before);
}

#[test]
fn windows_follow_their_workspace() {
    let mut desktop = Desktop::start();
    let output = desktop.output;
    let (surface, window) = desktop.map_window((400, 300));
    assert_eq!(desktop.shell.active_surface(), Some(surface));

    let second = desktop.shell.workspace(1).unwrap();
    desktop.shell.activate_workspace(second, output, false);
    assert_eq!(desktop.shell.active_surface(), None);

    desktop.shell.move_to_workspace(window, second);
    assert_eq!(desktop.shell.shell_surface(window).map(|s| s.workspace()), Some(second));
    let view = desktop.shell.shell_surface(window).and_then(|s| s.view(output)).unwrap();
    // the window is shown at its own place on the current workspace
    assert_eq!(
        desktop.shell.scene().global_position(view),
        Some(Point::<f64, Logical>::from((760.0, 390.0)))
    );
}

#[test]
fn resize_with_opposite_edges_is_refused() {
    let mut desktop = Desktop::start();
    let seat = desktop.seat;
    let (_, window) = desktop.map_window((800, 600));
    desktop.shell.pointer_motion(seat, (600.0, 300.0).into(), 0);
    desktop.shell.pointer_button(seat, BTN_LEFT, ButtonState::Pressed, 1);

    let edges = (ResizeEdge::LEFT | ResizeEdge::RIGHT).bits();
    assert!(matches!(
        desktop.shell.resize_surface(window, seat, edges),
        Err(ShellError::Resize(_))
    ));
    assert!(!desktop.shell.is_grabbed(seat));

    let serial = desktop
        .shell
        .resize_surface(window, seat, ResizeEdge::BOTTOM_RIGHT.bits())
        .unwrap();
    assert!(serial.is_some());
    assert!(desktop.shell.is_grabbed(seat));
}

#[test]
fn move_follows_the_pointer_until_release() {
    let mut desktop = Desktop::start();
    let seat = desktop.seat;
    let (_, window) = desktop.map_window((800, 600));
    assert_eq!(desktop.shell.shell_surface(window).unwrap().location(), Point::from((560, 240)));

    desktop.shell.pointer_motion(seat, (600.0, 300.0).into(), 0);
    desktop.shell.pointer_button(seat, BTN_LEFT, ButtonState::Pressed, 1);
    assert!(desktop.shell.move_surface(window, seat).is_some());

    desktop.shell.pointer_motion(seat, (700.0, 350.0).into(), 2);
    assert_eq!(desktop.shell.shell_surface(window).unwrap().location(), Point::from((660, 290)));

    // close enough to the left edge to snap
    desktop.shell.pointer_motion(seat, (45.0, 350.0).into(), 3);
    assert_eq!(desktop.shell.shell_surface(window).unwrap().location(), Point::from((0, 290)));

    desktop.shell.pointer_button(seat, BTN_LEFT, ButtonState::Released, 4);
    assert!(!desktop.shell.is_grabbed(seat));
}

#[test]
fn roles_are_exclusive() {
    let mut desktop = Desktop::start();
    let output = desktop.output;
    let surface = desktop.shell.create_surface(DESKTOP);
    desktop.shell.get_shell_surface(surface).unwrap();

    assert!(matches!(
        desktop.shell.set_panel(surface, output, PanelEdge::Top),
        Err(ShellError::Role(_))
    ));
    // asking twice for the same role is fine
    assert!(desktop.shell.get_shell_surface(surface).is_ok());
}

#[test]
fn privileged_requests_are_refused_to_applications() {
    let mut desktop = Desktop::start();
    let output = desktop.output;
    let surface = desktop.shell.create_surface(APP);
    assert_eq!(
        desktop.shell.set_background(surface, output),
        Err(ShellError::NotPrivileged(APP))
    );
    assert_eq!(desktop.shell.surface(surface).and_then(|s| s.role()), None);
}

#[test]
fn only_one_surface_is_active() {
    let mut desktop = Desktop::start();
    let (first, _) = desktop.map_window((400, 300));
    let (second, _) = desktop.map_window((400, 300));
    assert_eq!(desktop.shell.active_surface(), Some(second));
    desktop.flush();

    desktop.shell.activate(first);
    let events: Vec<_> = desktop
        .flush()
        .iter()
        .filter(|e| matches!(e, ShellEvent::Activated(_) | ShellEvent::Deactivated(_)))
        .cloned()
        .collect();
    assert_eq!(events, vec![ShellEvent::Deactivated(second), ShellEvent::Activated(first)]);
    assert_eq!(desktop.shell.scope(ScopeKind::Apps).active(), Some(first));

    desktop.shell.destroy_surface(first);
    assert_eq!(desktop.shell.active_surface(), Some(second));
}

#[test]
fn lock_screen_takes_the_keyboard() {
    let mut desktop = Desktop::start();
    let (surface, _) = desktop.map_window((400, 300));
    let lock = desktop.shell.create_surface(DESKTOP);
    let output = desktop.output;
    desktop.shell.set_lock_surface(lock, output).unwrap();
    desktop.shell.surface_committed(lock, (1920, 1080).into());

    desktop.shell.lock();
    let seat = desktop.seat;
    assert_eq!(desktop.shell.seat(seat).and_then(|s| s.keyboard_focus()), Some(lock));
    assert_eq!(desktop.shell.current_scope(), ScopeKind::Locked);

    desktop.shell.unlock();
    assert_eq!(desktop.shell.seat(seat).and_then(|s| s.keyboard_focus()), Some(surface));
    assert_eq!(desktop.shell.active_surface(), Some(surface));
}

#[test]
fn popup_is_dismissed_by_a_click_elsewhere() {
    let mut desktop = Desktop::start();
    let seat = desktop.seat;
    let (parent, _) = desktop.map_window((800, 600));
    let popup = desktop.shell.create_surface(APP);
    desktop.shell.surface_committed(popup, (100, 200).into());
    let serial = desktop
        .shell
        .set_popup(popup, parent, (10, 10).into(), seat)
        .unwrap()
        .unwrap();
    assert_eq!(desktop.shell.seat(seat).and_then(|s| s.pointer().grab_serial()), Some(serial));
    desktop.flush();

    // nothing of the client lies under the pointer there
    desktop.shell.pointer_motion(seat, (5.0, 5.0).into(), 0);
    desktop.shell.pointer_button(seat, BTN_LEFT, ButtonState::Pressed, 1);
    let events = desktop.flush().to_vec();
    assert!(events.contains(&ShellEvent::PopupDone(popup)));
    assert!(events.contains(&ShellEvent::GrabEnded { seat, serial }));
    assert!(!desktop.shell.is_grabbed(seat));
}

struct RecordingGrab {
    name: &'static str,
    log: Rc<RefCell<Vec<String>>>,
    start_data: GrabStartData,
}

impl PointerGrab for RecordingGrab {
    fn start(&mut self, _handle: &mut PointerInnerHandle<'_>) {
        self.log.borrow_mut().push(format!("{} start", self.name));
    }

    fn motion(
        &mut self,
        handle: &mut PointerInnerHandle<'_>,
        focus: Option<(ViewId, Point<f64, Logical>)>,
        event: &MotionEvent,
    ) {
        self.log.borrow_mut().push(format!("{} motion", self.name));
        handle.motion(focus, event);
    }

    fn button(&mut self, handle: &mut PointerInnerHandle<'_>, event: &ButtonEvent) {
        handle.button(event);
    }

    fn axis(&mut self, handle: &mut PointerInnerHandle<'_>, details: AxisFrame) {
        handle.axis(details);
    }

    fn ended(&mut self, _handle: &mut PointerInnerHandle<'_>) {
        self.log.borrow_mut().push(format!("{} ended", self.name));
    }

    fn start_data(&self) -> &GrabStartData {
        &self.start_data
    }
}

fn start_data() -> GrabStartData {
    GrabStartData {
        focus: None,
        button: 0,
        location: (0.0, 0.0).into(),
    }
}

#[test]
fn replaced_grab_ends_before_the_next_starts() {
    let mut desktop = Desktop::start();
    let seat = desktop.seat;
    let log = Rc::new(RefCell::new(Vec::new()));
    let grab = |name| RecordingGrab {
        name,
        log: log.clone(),
        start_data: start_data(),
    };

    let first = desktop.shell.start_grab(seat, grab("first"), None);
    let second = desktop.shell.start_grab(seat, grab("second"), None);
    assert_eq!(*log.borrow(), ["first start", "first ended", "second start"]);
    assert!(desktop.flush().contains(&ShellEvent::GrabEnded { seat, serial: first }));

    assert!(desktop.shell.end_grab_with_serial(seat, first).is_err());
    assert!(desktop.shell.is_grabbed(seat));

    desktop.shell.end_grab(seat);
    desktop.shell.end_grab(seat);
    assert_eq!(log.borrow().iter().filter(|l| *l == "second ended").count(), 1);
    let ended: Vec<_> = desktop
        .flush()
        .iter()
        .filter(|e| matches!(e, ShellEvent::GrabEnded { .. }))
        .cloned()
        .collect();
    assert_eq!(ended, vec![ShellEvent::GrabEnded { seat, serial: second }]);
}

#[test]
fn inert_grab_swallows_the_next_press() {
    let mut desktop = Desktop::start();
    let seat = desktop.seat;
    let (surface, _) = desktop.map_window((800, 600));
    desktop.shell.pointer_motion(seat, (600.0, 300.0).into(), 0);
    desktop.shell.start_grab(seat, InertGrab::new(start_data()), None);
    desktop.flush();

    desktop.shell.pointer_button(seat, BTN_LEFT, ButtonState::Pressed, 1);
    let events = desktop.flush().to_vec();
    assert!(!events.iter().any(|e| matches!(e, ShellEvent::PointerButton { .. })));
    assert!(!desktop.shell.is_grabbed(seat));

    desktop.shell.pointer_button(seat, BTN_LEFT, ButtonState::Released, 2);
    desktop.shell.pointer_button(seat, BTN_LEFT, ButtonState::Pressed, 3);
    assert!(desktop.flush().iter().any(|e| matches!(
        e,
        ShellEvent::PointerButton { surface: s, .. } if *s == surface
    )));
}

// Ends itself from `ended`, as a grab tearing down its state would
struct SelfEndingGrab(RecordingGrab);

impl PointerGrab for SelfEndingGrab {
    fn motion(
        &mut self,
        handle: &mut PointerInnerHandle<'_>,
        focus: Option<(ViewId, Point<f64, Logical>)>,
        event: &MotionEvent,
    ) {
        self.0.motion(handle, focus, event);
    }

    fn button(&mut self, handle: &mut PointerInnerHandle<'_>, event: &ButtonEvent) {
        self.0.button(handle, event);
    }

    fn axis(&mut self, handle: &mut PointerInnerHandle<'_>, details: AxisFrame) {
        self.0.axis(handle, details);
    }

    fn start(&mut self, handle: &mut PointerInnerHandle<'_>) {
        self.0.start(handle);
    }

    fn ended(&mut self, handle: &mut PointerInnerHandle<'_>) {
        self.0.ended(handle);
        handle.unset_grab();
    }

    fn start_data(&self) -> &GrabStartData {
        self.0.start_data()
    }
}

#[test]
fn grab_ending_itself_on_replacement_keeps_its_successor() {
    let mut desktop = Desktop::start();
    let seat = desktop.seat;
    let log = Rc::new(RefCell::new(Vec::new()));
    let grab = |name| RecordingGrab {
        name,
        log: log.clone(),
        start_data: start_data(),
    };

    desktop.shell.start_grab(seat, SelfEndingGrab(grab("first")), None);
    let second = desktop.shell.start_grab(seat, grab("second"), None);
    assert_eq!(*log.borrow(), ["first start", "first ended", "second start"]);
    assert!(desktop.shell.is_grabbed(seat));
    assert_eq!(desktop.shell.seat(seat).and_then(|s| s.pointer().grab_serial()), Some(second));

    // still routed to the successor
    desktop.shell.pointer_motion(seat, (10.0, 10.0).into(), 0);
    assert_eq!(log.borrow().last().map(String::as_str), Some("second motion"));

    // ending itself outside of a replacement still works
    desktop.shell.start_grab(seat, SelfEndingGrab(grab("third")), None);
    desktop.shell.end_grab(seat);
    assert!(!desktop.shell.is_grabbed(seat));
}

#[test]
fn registered_default_grab_comes_back_after_a_grab_ends() {
    let mut desktop = Desktop::start();
    let seat = desktop.seat;
    let log = Rc::new(RefCell::new(Vec::new()));
    let grab = |name| RecordingGrab {
        name,
        log: log.clone(),
        start_data: start_data(),
    };

    desktop.shell.set_default_grab(seat, Some(Box::new(grab("default"))));
    desktop.shell.start_grab(seat, grab("custom"), None);
    desktop.shell.pointer_motion(seat, (10.0, 10.0).into(), 0);
    desktop.shell.end_grab(seat);
    assert!(!desktop.shell.is_grabbed(seat));

    desktop.shell.pointer_motion(seat, (20.0, 20.0).into(), 1);
    desktop.shell.pointer_motion(seat, (30.0, 30.0).into(), 2);
    assert_eq!(
        *log.borrow(),
        ["custom start", "custom motion", "custom ended", "default motion", "default motion"]
    );
}

fn surface_at(desktop: &Desktop, point: (f64, f64)) -> Option<SurfaceId> {
    let scene = desktop.shell.scene();
    scene
        .view_under(point.into())
        .and_then(|(view, _)| scene.view(view)?.surface())
}

#[test]
fn workspaces_panned_away_stay_off_neighbouring_outputs() {
    let mut desktop = Desktop::start();
    let left = desktop.output;
    let right = desktop
        .shell
        .add_output("DP-2", Rectangle::from_loc_and_size((1920, 0), (1920, 1080)));
    let ws0 = desktop.shell.workspace(0).unwrap();
    let ws1 = desktop.shell.workspace(1).unwrap();

    let (surface, window) = desktop.map_window((800, 600));
    desktop.shell.move_to_workspace(window, ws1);
    desktop.shell.activate_workspace(ws1, left, false);
    assert_eq!(desktop.shell.current_workspace(left), Some(ws1));
    assert_eq!(desktop.shell.current_workspace(right), Some(ws0));
    assert_eq!(
        desktop.shell.shell_surface(window).unwrap().location(),
        Point::from((560, 240))
    );

    assert_eq!(surface_at(&desktop, (600.0, 300.0)), Some(surface));
    // one grid column to the right, where the right output shows its own workspace
    assert_eq!(surface_at(&desktop, (2520.0, 300.0)), None);

    desktop.shell.activate_workspace(ws1, right, false);
    assert_eq!(surface_at(&desktop, (2520.0, 300.0)), None);
    assert_eq!(surface_at(&desktop, (600.0, 300.0)), Some(surface));
}

#[test]
fn inactive_transient_is_never_activated() {
    let mut desktop = Desktop::start();
    let (parent_surface, parent) = desktop.map_window((800, 600));
    let child_surface = desktop.shell.create_surface(APP);
    let child = desktop.shell.get_shell_surface(child_surface).unwrap();
    desktop.shell.set_parent(child, parent, (10, 10).into(), true);
    desktop.shell.committed(child, (200, 100).into(), 0, 0);

    assert!(desktop.shell.shell_surface(child).unwrap().is_mapped());
    assert_eq!(desktop.shell.active_surface(), Some(parent_surface));
    desktop.shell.activate(child_surface);
    assert_eq!(desktop.shell.active_surface(), Some(parent_surface));

    // clicking it does not hand it the keyboard either
    let seat = desktop.seat;
    desktop.shell.pointer_motion(seat, (600.0, 280.0).into(), 0);
    desktop.shell.pointer_button(seat, BTN_LEFT, ButtonState::Pressed, 1);
    assert_eq!(desktop.shell.active_surface(), Some(parent_surface));
}

#[test]
fn busy_cursor_comes_back_when_reentering_an_unresponsive_window() {
    let mut desktop = Desktop::start();
    let seat = desktop.seat;
    let (_, window) = desktop.map_window((800, 600));
    let cursor = |desktop: &Desktop| desktop.shell.seat(seat).unwrap().pointer().cursor();

    desktop.shell.pointer_motion(seat, (960.0, 540.0).into(), 0);
    desktop.shell.set_responsive(window, false);
    assert!(desktop.shell.is_grabbed(seat));
    assert_eq!(cursor(&desktop), CursorIcon::Wait);

    desktop.shell.pointer_motion(seat, (5.0, 5.0).into(), 1);
    assert!(!desktop.shell.is_grabbed(seat));
    assert_eq!(cursor(&desktop), CursorIcon::Default);

    desktop.shell.pointer_motion(seat, (960.0, 540.0).into(), 2);
    assert!(desktop.shell.is_grabbed(seat));
    assert_eq!(cursor(&desktop), CursorIcon::Wait);

    desktop.shell.set_responsive(window, true);
    assert!(!desktop.shell.is_grabbed(seat));
    assert_eq!(cursor(&desktop), CursorIcon::Default);
    desktop.shell.pointer_motion(seat, (900.0, 500.0).into(), 3);
    assert!(!desktop.shell.is_grabbed(seat));
}

#[test]
fn unanswered_ping_marks_the_window_busy() {
    let mut desktop = Desktop::start();
    let seat = desktop.seat;
    let output = desktop.output;
    let (surface, window) = desktop.map_window((800, 600));
    desktop.shell.pointer_motion(seat, (960.0, 540.0).into(), 0);
    desktop.flush();

    let serial = desktop.shell.ping(window, Time::from_millis(1000)).unwrap();
    assert!(desktop.flush().contains(&ShellEvent::Ping { surface, serial }));
    // no second ping while the first one is pending
    assert_eq!(desktop.shell.ping(window, Time::from_millis(1050)), Some(serial));
    assert!(desktop.flush().is_empty());

    desktop.shell.tick(output, Time::from_millis(1100));
    assert!(desktop.shell.shell_surface(window).unwrap().is_responsive());

    desktop.shell.tick(output, Time::from_millis(1300));
    assert!(!desktop.shell.shell_surface(window).unwrap().is_responsive());
    assert!(desktop.shell.is_grabbed(seat));
    assert!(desktop
        .flush()
        .contains(&ShellEvent::CursorChanged { seat, icon: CursorIcon::Wait }));

    // a late answer to another ping is ignored
    desktop.shell.pong(surface, Serial::from(u32::from(serial) + 1));
    assert!(!desktop.shell.shell_surface(window).unwrap().is_responsive());

    desktop.shell.pong(surface, serial);
    assert!(desktop.shell.shell_surface(window).unwrap().is_responsive());
    assert!(!desktop.shell.is_grabbed(seat));
    assert_eq!(desktop.shell.seat(seat).unwrap().pointer().cursor(), CursorIcon::Default);
}

#[test]
fn minimized_window_hands_activation_back() {
    let mut desktop = Desktop::start();
    let (first, _) = desktop.map_window((400, 300));
    let (second, window) = desktop.map_window((400, 300));
    assert_eq!(desktop.shell.active_surface(), Some(second));

    desktop.shell.minimize(window);
    assert!(desktop.shell.shell_surface(window).unwrap().is_minimized());
    assert_eq!(desktop.shell.active_surface(), Some(first));
    let view = desktop.shell.shell_surface(window).unwrap().view(desktop.output).unwrap();
    assert_eq!(desktop.shell.scene().view(view).unwrap().layer(), Some(LayerKind::Minimized));
    // minimized windows cannot be activated
    desktop.shell.activate(second);
    assert_eq!(desktop.shell.active_surface(), Some(first));

    desktop.shell.restore(window);
    assert!(!desktop.shell.shell_surface(window).unwrap().is_minimized());
    assert_eq!(desktop.shell.active_surface(), Some(second));
    assert_eq!(desktop.shell.scene().view(view).unwrap().layer(), Some(LayerKind::Apps));
}

#[test]
fn transient_follows_its_parent_and_outlives_it_untyped() {
    let mut desktop = Desktop::start();
    let (parent_surface, parent) = desktop.map_window((800, 600));
    let child_surface = desktop.shell.create_surface(APP);
    let child = desktop.shell.get_shell_surface(child_surface).unwrap();
    desktop.shell.set_parent(child, parent, (10, 20).into(), false);
    desktop.shell.committed(child, (200, 100).into(), 0, 0);

    let sh = desktop.shell.shell_surface(child).unwrap();
    assert!(sh.is_mapped());
    assert_eq!(sh.location(), Point::from((570, 260)));
    assert_eq!(desktop.shell.active_surface(), Some(child_surface));
    let output = desktop.output;
    let parent_view = desktop.shell.shell_surface(parent).unwrap().view(output).unwrap();
    let child_view = sh.view(output).unwrap();
    assert!(desktop.shell.scene().is_above(child_view, parent_view));

    // a parent cannot become a transient of its own child
    desktop.shell.set_parent(parent, child, (0, 0).into(), false);
    assert!(matches!(
        desktop.shell.shell_surface(parent).unwrap().surface_type(),
        SurfaceType::Toplevel { .. }
    ));

    desktop.shell.destroy_surface(parent_surface);
    let sh = desktop.shell.shell_surface(child).unwrap();
    assert!(!sh.is_mapped());
    assert_eq!(sh.surface_type(), SurfaceType::None);
    assert_eq!(desktop.shell.active_surface(), None);
}

#[test]
fn empty_commit_unmaps_the_window() {
    let mut desktop = Desktop::start();
    let (surface, window) = desktop.map_window((800, 600));
    assert_eq!(surface_at(&desktop, (960.0, 540.0)), Some(surface));
    desktop.flush();

    desktop.shell.committed(window, (0, 0).into(), 0, 0);
    assert!(desktop.flush().contains(&ShellEvent::Unmapped(surface)));
    let sh = desktop.shell.shell_surface(window).unwrap();
    assert!(!sh.is_mapped());
    assert_eq!(sh.surface_type(), SurfaceType::None);
    assert_eq!(surface_at(&desktop, (960.0, 540.0)), None);
    assert_eq!(desktop.shell.active_surface(), None);

    // without a new type, content is not shown again
    desktop.shell.committed(window, (800, 600).into(), 0, 0);
    assert!(!desktop.shell.shell_surface(window).unwrap().is_mapped());
    desktop.shell.set_toplevel(window);
    desktop.shell.committed(window, (800, 600).into(), 0, 0);
    assert!(desktop.shell.shell_surface(window).unwrap().is_mapped());
}

#[test]
fn output_vote_prefers_the_current_workspace_then_pointers() {
    let mut desktop = Desktop::start();
    let seat = desktop.seat;
    let left = desktop.output;
    let right = desktop
        .shell
        .add_output("DP-2", Rectangle::from_loc_and_size((1920, 0), (1920, 1080)));
    let ws0 = desktop.shell.workspace(0).unwrap();
    let ws1 = desktop.shell.workspace(1).unwrap();

    // both show the workspace and no pointer is inside: first registered wins
    desktop.shell.pointer_motion(seat, (-100.0, -100.0).into(), 0);
    assert_eq!(desktop.shell.select_output(ws0), Some(left));

    desktop.shell.pointer_motion(seat, (2500.0, 500.0).into(), 1);
    assert_eq!(desktop.shell.select_output(ws0), Some(right));

    // showing the workspace outweighs the pointer
    desktop.shell.activate_workspace(ws1, right, false);
    assert_eq!(desktop.shell.select_output(ws0), Some(left));
    assert_eq!(desktop.shell.select_output(ws1), Some(right));

    let (_, window) = desktop.map_window((400, 300));
    let sh = desktop.shell.shell_surface(window).unwrap();
    assert_eq!(sh.output(), Some(right));
    assert_eq!(sh.location(), Point::from((1920 + 760, 390)));
}

#[test]
fn removed_output_hands_its_windows_over() {
    let mut desktop = Desktop::start();
    let left = desktop.output;
    let right = desktop
        .shell
        .add_output("DP-2", Rectangle::from_loc_and_size((1920, 0), (1920, 1080)));
    let ws1 = desktop.shell.workspace(1).unwrap();
    desktop.shell.activate_workspace(ws1, right, false);
    let (surface, window) = desktop.map_window((400, 300));
    assert_eq!(desktop.shell.shell_surface(window).unwrap().output(), Some(right));

    desktop.shell.remove_output(right);
    assert!(desktop.shell.output(right).is_none());
    let sh = desktop.shell.shell_surface(window).unwrap();
    assert_eq!(sh.output(), Some(left));
    assert_eq!(sh.location(), Point::from((760, 390)));
    assert!(sh.view(right).is_none());
    assert!(sh.view(left).is_some());

    assert_eq!(desktop.shell.current_workspace(right), None);
    assert!(desktop.shell.workspaces().iter().all(|w| w.view(right).is_none()));
    assert!(!desktop.shell.is_workspace_shown(ws1));

    // the window shows up once its workspace does
    desktop.shell.activate_workspace(ws1, left, false);
    assert_eq!(surface_at(&desktop, (960.0, 540.0)), Some(surface));
}

#[test]
fn fullscreen_window_is_centered_and_scaled_on_a_backdrop() {
    let mut desktop = Desktop::start();
    let output = desktop.output;
    let (surface, window) = desktop.map_window((960, 720));
    desktop.flush();

    desktop.shell.set_fullscreen(window, None);
    assert_eq!(desktop.configures(surface), vec![Size::from((1920, 1080))]);
    // the client keeps its size
    desktop.shell.committed(window, (960, 720).into(), 0, 0);

    let sh = desktop.shell.shell_surface(window).unwrap();
    assert!(sh.is_fullscreen());
    let view = sh.view(output).unwrap();
    let backdrop = sh.backdrop(output).unwrap();
    let scene = desktop.shell.scene();
    assert_eq!(scene.view(view).unwrap().layer(), Some(LayerKind::Fullscreen));
    assert_eq!(scene.view(backdrop).unwrap().layer(), Some(LayerKind::Fullscreen));
    assert!(scene.is_above(view, backdrop));
    assert_eq!(scene.view(backdrop).unwrap().size(), Size::from((1920, 1080)));
    assert_eq!(scene.view(view).unwrap().transform(), Some(Affine::scale(1.5, 1.5)));
    assert_eq!(scene.global_position(view), Some(Point::from((240.0, 0.0))));
    // the bars left and right belong to the backdrop
    assert_eq!(surface_at(&desktop, (100.0, 540.0)), None);
    assert_eq!(surface_at(&desktop, (960.0, 540.0)), Some(surface));

    desktop.shell.set_toplevel(window);
    assert_eq!(desktop.configures(surface), vec![Size::from((960, 720))]);
    desktop.shell.committed(window, (960, 720).into(), 0, 0);
    let sh = desktop.shell.shell_surface(window).unwrap();
    assert!(!sh.is_fullscreen());
    assert!(sh.backdrop(output).is_none());
    assert_eq!(sh.location(), Point::from((480, 180)));
    assert_eq!(desktop.shell.scene().view(view).unwrap().transform(), None);
}

#[test]
fn desktop_grid_click_picks_a_workspace() {
    let mut desktop = Desktop::start();
    let seat = desktop.seat;
    let output = desktop.output;
    let ws2 = desktop.shell.workspace(2).unwrap();

    desktop.shell.show_desktop_grid(output);
    assert!(desktop.shell.pager().is_grid_shown(output));
    assert!(desktop.shell.is_grabbed(seat));

    // 3x2 grid of 640x360 cells, centered vertically
    assert_eq!(desktop.shell.grid_workspace_at(output, (1500.0, 300.0).into()), Some(ws2));
    assert_eq!(desktop.shell.grid_workspace_at(output, (1500.0, 100.0).into()), None);

    desktop.shell.pointer_motion(seat, (1500.0, 300.0).into(), 0);
    desktop.flush();
    desktop.shell.pointer_button(seat, BTN_LEFT, ButtonState::Pressed, 1);
    let events = desktop.flush().to_vec();
    assert!(!desktop.shell.pager().is_grid_shown(output));
    assert!(!desktop.shell.is_grabbed(seat));
    assert_eq!(desktop.shell.current_workspace(output), Some(ws2));
    assert!(events.contains(&ShellEvent::WorkspaceActivated { output, workspace: ws2 }));
    assert!(!events.iter().any(|e| matches!(e, ShellEvent::PointerButton { .. })));
}

#[test]
fn desktop_grid_hidden_by_the_shell_releases_the_pointer() {
    let mut desktop = Desktop::start();
    let seat = desktop.seat;
    let output = desktop.output;
    let ws0 = desktop.shell.workspace(0).unwrap();

    desktop.shell.show_desktop_grid(output);
    desktop.shell.hide_desktop_grid(output);
    assert!(!desktop.shell.is_grabbed(seat));
    assert_eq!(desktop.shell.current_workspace(output), Some(ws0));
    assert_eq!(desktop.shell.grid_workspace_at(output, (1500.0, 300.0).into()), None);
}

#[test]
fn popup_stays_above_its_raised_parent() {
    let mut desktop = Desktop::start();
    let seat = desktop.seat;
    let output = desktop.output;
    let (_, other) = desktop.map_window((400, 300));
    let (parent_surface, parent) = desktop.map_window((800, 600));
    let popup = desktop.shell.create_surface(APP);
    desktop.shell.surface_committed(popup, (100, 200).into());
    desktop
        .shell
        .set_popup(popup, parent_surface, (10, 10).into(), seat)
        .unwrap();
    let popup_view = desktop
        .shell
        .scene()
        .views()
        .find(|v| v.surface() == Some(popup))
        .map(|v| v.id())
        .unwrap();

    desktop.shell.raise(other);
    desktop.shell.raise(parent);
    let parent_view = desktop.shell.shell_surface(parent).unwrap().view(output).unwrap();
    let other_view = desktop.shell.shell_surface(other).unwrap().view(output).unwrap();
    let scene = desktop.shell.scene();
    assert!(scene.is_above(parent_view, other_view));
    assert!(scene.is_above(popup_view, parent_view));
}

#[test]
fn workspace_count_is_capped() {
    let mut desktop = Desktop::with_config(ShellConfig {
        workspaces: MAX_WORKSPACES + 8,
        animate_workspace_switch: false,
        ..ShellConfig::default()
    });
    assert_eq!(desktop.shell.workspaces().len(), MAX_WORKSPACES);
    assert_eq!(desktop.shell.add_workspace(), None);

    // the last one still gets a mask of its own
    let last = desktop.shell.workspace(MAX_WORKSPACES - 1).unwrap();
    let (surface, window) = desktop.map_window((400, 300));
    desktop.shell.move_to_workspace(window, last);
    assert_eq!(desktop.shell.shell_surface(window).unwrap().workspace(), last);
    let output = desktop.output;
    desktop.shell.activate_workspace(last, output, false);
    assert_eq!(desktop.shell.active_surface(), Some(surface));
}
