//! Builtin engine library seeded at startup.

use super::{ReflectedEvent, ReflectedFunction, ReflectedParam, ReflectedType, ReflectedVariable};
use crate::primitives::PinType;

pub mod paths {
    pub const OBJECT: &str = "/Script/CoreUObject.Object";
    pub const ACTOR: &str = "/Script/Engine.Actor";
    pub const PAWN: &str = "/Script/Engine.Pawn";
    pub const CHARACTER: &str = "/Script/Engine.Character";
    pub const CONTROLLER: &str = "/Script/Engine.Controller";

    pub const MATH_LIBRARY: &str = "/Script/Engine.KismetMathLibrary";
    pub const STRING_LIBRARY: &str = "/Script/Engine.KismetStringLibrary";
    pub const SYSTEM_LIBRARY: &str = "/Script/Engine.KismetSystemLibrary";

    pub const VECTOR: &str = "/Script/CoreUObject.Vector";
    pub const ROTATOR: &str = "/Script/CoreUObject.Rotator";
}

struct Def(ReflectedFunction);

impl Def {
    fn new(name: &str, category: &str) -> Self {
        let mut f = ReflectedFunction::new(name);
        f.category = category.to_string();
        Def(f)
    }

    fn display(mut self, name: &str) -> Self {
        self.0.display_name = Some(name.to_string());
        self
    }

    fn keywords(mut self, words: &[&str]) -> Self {
        self.0.keywords = words.iter().map(|w| w.to_string()).collect();
        self
    }

    fn tooltip(mut self, text: &str) -> Self {
        self.0.tooltip = text.to_string();
        self
    }

    fn param(mut self, param: ReflectedParam) -> Self {
        self.0.params.push(param);
        self
    }

    fn returns(mut self, ty: PinType) -> Self {
        self.0.return_type = Some(ty);
        self
    }

    fn pure(mut self) -> Self {
        self.0.pure = true;
        self
    }

    fn is_static(mut self) -> Self {
        self.0.is_static = true;
        self
    }

    fn latent(mut self) -> Self {
        self.0.latent = true;
        self
    }

    fn deprecated(mut self) -> Self {
        self.0.deprecated = true;
        self
    }

    fn build(self) -> ReflectedFunction {
        self.0
    }
}

fn p(name: &str, ty: PinType) -> ReflectedParam {
    ReflectedParam::new(name, ty)
}

fn var(name: &str, ty: PinType, category: &str, tooltip: &str) -> ReflectedVariable {
    let mut v = ReflectedVariable::new(name, ty);
    v.category = category.to_string();
    v.tooltip = tooltip.to_string();
    v
}

fn event(name: &str, display: &str, params: Vec<ReflectedParam>) -> ReflectedEvent {
    ReflectedEvent {
        name: name.to_string(),
        display_name: Some(display.to_string()),
        tooltip: String::new(),
        params,
    }
}

/// Static pure math on a single value type: `Name(A, B) -> T`.
fn binary(name: &str, display: &str, category: &str, ty: PinType, keywords: &[&str]) -> ReflectedFunction {
    Def::new(name, category)
        .display(display)
        .keywords(keywords)
        .param(p("A", ty.clone()))
        .param(p("B", ty.clone()))
        .returns(ty)
        .pure()
        .is_static()
        .build()
}

fn math_library() -> ReflectedType {
    let mut lib = ReflectedType::library(paths::MATH_LIBRARY, "Kismet Math Library");
    let real = PinType::real;
    let int = PinType::int;

    lib.functions = vec![
        Def::new("Clamp", "Math|Integer")
            .display("Clamp")
            .keywords(&["clamp", "limit", "range"])
            .tooltip("Returns Value clamped to be between A and B (inclusive)")
            .param(p("Value", int()))
            .param(p("Min", int()).default_value("0"))
            .param(p("Max", int()).default_value("0"))
            .returns(int())
            .pure()
            .is_static()
            .build(),
        Def::new("FClamp", "Math|Float")
            .display("Clamp (Float)")
            .keywords(&["clamp", "limit", "range"])
            .tooltip("Returns Value clamped between A and B (inclusive)")
            .param(p("Value", real()))
            .param(p("Min", real()).default_value("0.0"))
            .param(p("Max", real()).default_value("1.0"))
            .returns(real())
            .pure()
            .is_static()
            .build(),
        Def::new("MapRangeClamped", "Math|Float")
            .display("Map Range Clamped")
            .keywords(&["remap", "range", "clamp"])
            .tooltip("Returns Value mapped from one range into another, clamped to the output range")
            .param(p("Value", real()))
            .param(p("InRangeA", real()).default_value("0.0"))
            .param(p("InRangeB", real()).default_value("1.0"))
            .param(p("OutRangeA", real()).default_value("0.0"))
            .param(p("OutRangeB", real()).default_value("1.0"))
            .returns(real())
            .pure()
            .is_static()
            .build(),
        binary("Add_DoubleDouble", "Add", "Math|Float", real(), &["add", "plus", "+"]),
        binary("Subtract_DoubleDouble", "Subtract", "Math|Float", real(), &["subtract", "minus", "-"]),
        binary("Multiply_DoubleDouble", "Multiply", "Math|Float", real(), &["multiply", "times", "*"]),
        binary("Divide_DoubleDouble", "Divide", "Math|Float", real(), &["divide", "/"]),
        binary("Add_IntInt", "Add (Integer)", "Math|Integer", int(), &["add", "plus", "+"]),
        binary("FMin", "Min (Float)", "Math|Float", real(), &["min", "minimum"]),
        binary("FMax", "Max (Float)", "Math|Float", real(), &["max", "maximum"]),
        binary("Min", "Min", "Math|Integer", int(), &["min", "minimum"]),
        binary("Max", "Max", "Math|Integer", int(), &["max", "maximum"]),
        Def::new("Lerp", "Math|Float")
            .display("Lerp")
            .keywords(&["lerp", "interpolate", "blend"])
            .tooltip("Linearly interpolates between A and B based on Alpha")
            .param(p("A", real()))
            .param(p("B", real()))
            .param(p("Alpha", real()).default_value("0.5"))
            .returns(real())
            .pure()
            .is_static()
            .build(),
        Def::new("Abs", "Math|Float")
            .display("Absolute")
            .keywords(&["abs", "absolute"])
            .param(p("A", real()))
            .returns(real())
            .pure()
            .is_static()
            .build(),
        Def::new("Sin", "Math|Trig")
            .display("Sin (Radians)")
            .keywords(&["sine"])
            .param(p("A", real()))
            .returns(real())
            .pure()
            .is_static()
            .build(),
        Def::new("Cos", "Math|Trig")
            .display("Cos (Radians)")
            .keywords(&["cosine"])
            .param(p("A", real()))
            .returns(real())
            .pure()
            .is_static()
            .build(),
        Def::new("Sqrt", "Math|Float")
            .display("Square Root")
            .keywords(&["sqrt", "root"])
            .param(p("A", real()))
            .returns(real())
            .pure()
            .is_static()
            .build(),
        Def::new("RandomFloatInRange", "Math|Random")
            .display("Random Float in Range")
            .keywords(&["random", "rand"])
            .param(p("Min", real()).default_value("0.0"))
            .param(p("Max", real()).default_value("1.0"))
            .returns(real())
            .is_static()
            .pure()
            .build(),
        Def::new("MakeVector", "Math|Vector")
            .display("Make Vector")
            .keywords(&["make", "construct", "build"])
            .param(p("X", real()).default_value("0.0"))
            .param(p("Y", real()).default_value("0.0"))
            .param(p("Z", real()).default_value("0.0"))
            .returns(PinType::structure(paths::VECTOR))
            .pure()
            .is_static()
            .build(),
        Def::new("BreakVector", "Math|Vector")
            .display("Break Vector")
            .keywords(&["break", "split"])
            .param(p("InVec", PinType::structure(paths::VECTOR)))
            .param(p("X", real()).output())
            .param(p("Y", real()).output())
            .param(p("Z", real()).output())
            .pure()
            .is_static()
            .build(),
        Def::new("VSize", "Math|Vector")
            .display("Vector Length")
            .keywords(&["length", "magnitude", "size"])
            .param(p("A", PinType::structure(paths::VECTOR)))
            .returns(real())
            .pure()
            .is_static()
            .build(),
    ];
    lib
}

fn string_library() -> ReflectedType {
    let mut lib = ReflectedType::library(paths::STRING_LIBRARY, "Kismet String Library");
    let string = PinType::string;

    lib.functions = vec![
        Def::new("Concat_StrStr", "Utilities|String")
            .display("Append")
            .keywords(&["concatenate", "join", "append", "+"])
            .tooltip("Concatenates two strings together")
            .param(p("A", string()))
            .param(p("B", string()))
            .returns(string())
            .pure()
            .is_static()
            .build(),
        Def::new("Len", "Utilities|String")
            .display("Length")
            .keywords(&["length", "count", "size"])
            .param(p("S", string()))
            .returns(PinType::int())
            .pure()
            .is_static()
            .build(),
        Def::new("ToUpper", "Utilities|String")
            .display("To Upper")
            .keywords(&["uppercase", "capitalize"])
            .param(p("SourceString", string()))
            .returns(string())
            .pure()
            .is_static()
            .build(),
        Def::new("ToLower", "Utilities|String")
            .display("To Lower")
            .keywords(&["lowercase"])
            .param(p("SourceString", string()))
            .returns(string())
            .pure()
            .is_static()
            .build(),
        Def::new("Contains", "Utilities|String")
            .display("Contains")
            .keywords(&["find", "search", "substring"])
            .param(p("SearchIn", string()))
            .param(p("Substring", string()))
            .param(p("bUseCase", PinType::bool()).default_value("false").advanced())
            .returns(PinType::bool())
            .pure()
            .is_static()
            .build(),
        Def::new("Conv_IntToString", "Utilities|String")
            .display("To String (Integer)")
            .keywords(&["convert", "cast", "string"])
            .param(p("InInt", PinType::int()))
            .returns(string())
            .pure()
            .is_static()
            .build(),
        Def::new("Conv_DoubleToString", "Utilities|String")
            .display("To String (Float)")
            .keywords(&["convert", "cast", "string"])
            .param(p("InDouble", PinType::real()))
            .returns(string())
            .pure()
            .is_static()
            .build(),
    ];
    lib
}

fn system_library() -> ReflectedType {
    let mut lib = ReflectedType::library(paths::SYSTEM_LIBRARY, "Kismet System Library");

    lib.functions = vec![
        Def::new("PrintString", "Development")
            .display("Print String")
            .keywords(&["print", "log", "debug"])
            .tooltip("Prints a string to the log, and optionally, to the screen")
            .param(p("InString", PinType::string()).default_value("Hello"))
            .param(p("bPrintToScreen", PinType::bool()).default_value("true").advanced())
            .param(p("bPrintToLog", PinType::bool()).default_value("true").advanced())
            .param(p("Duration", PinType::real()).default_value("2.0").advanced())
            .is_static()
            .build(),
        Def::new("Delay", "Utilities|Flow Control")
            .display("Delay")
            .keywords(&["sleep", "wait"])
            .tooltip("Perform a latent action with a delay (specified in seconds)")
            .param(p("Duration", PinType::real()).default_value("0.2"))
            .is_static()
            .latent()
            .build(),
        Def::new("IsValid", "Utilities")
            .display("Is Valid")
            .keywords(&["valid", "null", "check"])
            .param(p("Object", PinType::object(paths::OBJECT)))
            .returns(PinType::bool())
            .pure()
            .is_static()
            .build(),
        Def::new("GetDisplayName", "Utilities")
            .display("Get Display Name")
            .keywords(&["get", "name"])
            .param(p("Object", PinType::object(paths::OBJECT)))
            .returns(PinType::string())
            .pure()
            .is_static()
            .build(),
        Def::new("PrintText", "Development")
            .display("Print Text (Legacy)")
            .keywords(&["print", "log"])
            .param(p("InText", PinType::new(crate::primitives::PinCategory::Text)))
            .is_static()
            .deprecated()
            .build(),
    ];
    lib
}

fn object_class() -> ReflectedType {
    let mut ty = ReflectedType::class(paths::OBJECT, "Object");
    ty.functions = vec![Def::new("GetName", "Utilities")
        .display("Get Object Name")
        .keywords(&["get", "name"])
        .returns(PinType::string())
        .pure()
        .build()];
    ty
}

fn actor_class() -> ReflectedType {
    let mut ty = ReflectedType::class(paths::ACTOR, "Actor");
    ty.parent = Some(paths::OBJECT.to_string());
    let vector = || PinType::structure(paths::VECTOR);

    ty.functions = vec![
        Def::new("K2_GetActorLocation", "Transformation")
            .display("Get Actor Location")
            .keywords(&["get", "location", "position"])
            .returns(vector())
            .pure()
            .build(),
        Def::new("K2_SetActorLocation", "Transformation")
            .display("Set Actor Location")
            .keywords(&["set", "location", "move", "teleport"])
            .param(p("NewLocation", vector()))
            .param(p("bSweep", PinType::bool()).default_value("false"))
            .returns(PinType::bool())
            .build(),
        Def::new("K2_GetActorRotation", "Transformation")
            .display("Get Actor Rotation")
            .keywords(&["get", "rotation"])
            .returns(PinType::structure(paths::ROTATOR))
            .pure()
            .build(),
        Def::new("K2_DestroyActor", "Actor")
            .display("Destroy Actor")
            .keywords(&["destroy", "delete", "remove"])
            .build(),
        Def::new("SetActorHiddenInGame", "Rendering")
            .display("Set Actor Hidden In Game")
            .keywords(&["set", "hide", "visible"])
            .param(p("bNewHidden", PinType::bool()).default_value("false"))
            .build(),
        Def::new("GetDistanceTo", "Utilities|Transformation")
            .display("Get Distance To")
            .keywords(&["get", "distance"])
            .param(p("OtherActor", PinType::object(paths::ACTOR)))
            .returns(PinType::real())
            .pure()
            .build(),
        Def::new("SetActorTickEnabled_Legacy", "Actor|Tick")
            .display("Set Actor Tick Enabled (Legacy)")
            .param(p("bEnabled", PinType::bool()))
            .deprecated()
            .build(),
    ];

    ty.variables = vec![
        var("bCanBeDamaged", PinType::bool(), "Actor", "Whether this actor can take damage"),
        var("InitialLifeSpan", PinType::real(), "Actor", "How long this Actor lives before dying"),
        var("Tags", PinType::name().array(), "Actor", "Array of tags"),
        ReflectedVariable {
            read_only: true,
            ..var("bHidden", PinType::bool(), "Rendering", "Whether the actor is hidden")
        },
    ];

    ty.events = vec![
        event("ReceiveBeginPlay", "Event BeginPlay", vec![]),
        event(
            "ReceiveTick",
            "Event Tick",
            vec![p("DeltaSeconds", PinType::real())],
        ),
        event(
            "ReceiveActorBeginOverlap",
            "Event ActorBeginOverlap",
            vec![p("OtherActor", PinType::object(paths::ACTOR))],
        ),
        event("ReceiveDestroyed", "Event Destroyed", vec![]),
    ];
    ty
}

fn controller_class() -> ReflectedType {
    let mut ty = ReflectedType::class(paths::CONTROLLER, "Controller");
    ty.parent = Some(paths::ACTOR.to_string());
    ty.functions = vec![Def::new("K2_GetPawn", "Pawn")
        .display("Get Controlled Pawn")
        .keywords(&["get", "pawn", "possess"])
        .returns(PinType::object(paths::PAWN))
        .pure()
        .build()];
    ty
}

fn pawn_class() -> ReflectedType {
    let mut ty = ReflectedType::class(paths::PAWN, "Pawn");
    ty.parent = Some(paths::ACTOR.to_string());

    ty.functions = vec![
        Def::new("AddMovementInput", "Pawn|Input")
            .display("Add Movement Input")
            .keywords(&["add", "move", "input"])
            .param(p("WorldDirection", PinType::structure(paths::VECTOR)))
            .param(p("ScaleValue", PinType::real()).default_value("1.0"))
            .param(p("bForce", PinType::bool()).default_value("false").advanced())
            .build(),
        Def::new("GetController", "Pawn")
            .display("Get Controller")
            .keywords(&["get", "controller"])
            .returns(PinType::object(paths::CONTROLLER))
            .pure()
            .build(),
    ];
    ty.variables = vec![var("BaseEyeHeight", PinType::real(), "Camera", "Base eye height above collision center")];
    ty.events = vec![event(
        "ReceivePossessed",
        "Event Possessed",
        vec![p("NewController", PinType::object(paths::CONTROLLER))],
    )];
    ty
}

fn character_class() -> ReflectedType {
    let mut ty = ReflectedType::class(paths::CHARACTER, "Character");
    ty.parent = Some(paths::PAWN.to_string());

    ty.functions = vec![
        Def::new("Jump", "Character")
            .display("Jump")
            .keywords(&["jump", "hop"])
            .build(),
        Def::new("StopJumping", "Character")
            .display("Stop Jumping")
            .keywords(&["jump", "stop"])
            .build(),
        Def::new("LaunchCharacter", "Character")
            .display("Launch Character")
            .keywords(&["launch", "impulse"])
            .param(p("LaunchVelocity", PinType::structure(paths::VECTOR)))
            .param(p("bXYOverride", PinType::bool()).default_value("false"))
            .param(p("bZOverride", PinType::bool()).default_value("false"))
            .build(),
        Def::new("CanJump", "Character")
            .display("Can Jump")
            .keywords(&["jump"])
            .returns(PinType::bool())
            .pure()
            .build(),
    ];
    ty.variables = vec![
        var("JumpMaxCount", PinType::int(), "Character", "Max number of jumps"),
        ReflectedVariable {
            read_only: true,
            ..var("bIsCrouched", PinType::bool(), "Character", "Set when character is crouching")
        },
    ];
    ty.events = vec![event("OnLanded", "Event On Landed", vec![])];
    ty
}

/// Every builtin type, parents before children.
pub fn builtin_types() -> Vec<ReflectedType> {
    vec![
        object_class(),
        actor_class(),
        controller_class(),
        pawn_class(),
        character_class(),
        math_library(),
        string_library(),
        system_library(),
    ]
}
